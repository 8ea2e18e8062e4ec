use clap::ValueEnum;
use image::{Rgb, RgbImage};

/// Pixel neighbourhood used when linking pixels into the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Connectivity {
    /// Horizontal and vertical neighbours.
    Four,
    /// Horizontal, vertical and both diagonals.
    #[default]
    Eight,
}

/// Undirected edge between two pixel nodes. `source < destination` always holds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub source: u32,
    pub destination: u32,
    pub weight: f32,
}

/// Weighted adjacency graph over the pixels of one image.
///
/// Node `i` is the pixel at `(i % width, i / width)`. Each neighbouring pair
/// appears exactly once in [`PixelGraph::edges`], in row-major order of the
/// source pixel.
#[derive(Debug, Clone)]
pub struct PixelGraph {
    width: u32,
    height: u32,
    edges: Vec<Edge>,
    sorted: bool,
}

impl PixelGraph {
    pub fn build(image: &RgbImage, connectivity: Connectivity) -> Self {
        let (width, height) = image.dimensions();
        let mut edges = Vec::with_capacity(expected_edge_count(width, height, connectivity));

        for y in 0..height {
            for x in 0..width {
                let source = y * width + x;
                let pixel = image.get_pixel(x, y);
                let mut link = |nx: u32, ny: u32| {
                    edges.push(Edge {
                        source,
                        destination: ny * width + nx,
                        weight: color_distance(pixel, image.get_pixel(nx, ny)),
                    });
                };

                if x + 1 < width {
                    link(x + 1, y);
                }
                if y + 1 < height {
                    link(x, y + 1);
                    if connectivity == Connectivity::Eight {
                        if x + 1 < width {
                            link(x + 1, y + 1);
                        }
                        if x > 0 {
                            link(x - 1, y + 1);
                        }
                    }
                }
            }
        }

        Self {
            width,
            height,
            edges,
            sorted: false,
        }
    }

    /// Stable sort of the edge list by ascending weight.
    ///
    /// Equal weights keep their construction order, so segmentation of
    /// identical input is reproducible.
    pub fn sort_by_weight(&mut self) {
        if !self.sorted {
            self.edges.sort_by(|a, b| a.weight.total_cmp(&b.weight));
            self.sorted = true;
        }
    }

    pub const fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    pub const fn node_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn is_empty(&self) -> bool {
        self.node_count() == 0
    }
}

/// Euclidean distance between two colors in RGB space.
pub fn color_distance(a: &Rgb<u8>, b: &Rgb<u8>) -> f32 {
    a.0.iter()
        .zip(b.0.iter())
        .map(|(&ca, &cb)| {
            let d = f32::from(ca) - f32::from(cb);
            d * d
        })
        .sum::<f32>()
        .sqrt()
}

fn expected_edge_count(width: u32, height: u32, connectivity: Connectivity) -> usize {
    let (w, h) = (width as usize, height as usize);
    if w == 0 || h == 0 {
        return 0;
    }
    let straight = (w - 1) * h + w * (h - 1);
    match connectivity {
        Connectivity::Four => straight,
        Connectivity::Eight => straight + 2 * (w - 1) * (h - 1),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_image_yields_empty_graph() {
        let graph = PixelGraph::build(&RgbImage::new(0, 0), Connectivity::Eight);
        assert!(graph.is_empty());
        assert!(graph.edges().is_empty());

        let graph = PixelGraph::build(&RgbImage::new(5, 0), Connectivity::Four);
        assert!(graph.is_empty());
        assert!(graph.edges().is_empty());
    }

    #[test]
    fn test_edge_counts() {
        let image = RgbImage::new(4, 3);
        let four = PixelGraph::build(&image, Connectivity::Four);
        assert_eq!(four.edges().len(), 3 * 3 + 4 * 2);

        let eight = PixelGraph::build(&image, Connectivity::Eight);
        assert_eq!(eight.edges().len(), 3 * 3 + 4 * 2 + 2 * 3 * 2);

        let single = PixelGraph::build(&RgbImage::new(1, 1), Connectivity::Eight);
        assert_eq!(single.node_count(), 1);
        assert!(single.edges().is_empty());
    }

    #[test]
    fn test_edges_are_ordered_and_never_self_loops() {
        let image = RgbImage::from_fn(6, 5, |x, y| Rgb([(x * 40) as u8, (y * 50) as u8, 7]));
        let graph = PixelGraph::build(&image, Connectivity::Eight);
        let nodes = graph.node_count() as u32;
        for edge in graph.edges() {
            assert!(edge.source < edge.destination);
            assert!(edge.destination < nodes);
            assert!(edge.weight >= 0.0);
        }
    }

    #[test]
    fn test_single_column_has_no_diagonals() {
        let graph = PixelGraph::build(&RgbImage::new(1, 4), Connectivity::Eight);
        assert_eq!(graph.edges().len(), 3);
    }

    #[test]
    fn test_sort_is_stable() {
        let image = RgbImage::from_fn(3, 1, |x, _| Rgb([(x * 100) as u8, 0, 0]));
        let mut graph = PixelGraph::build(&image, Connectivity::Four);
        let before = graph.edges().to_vec();
        graph.sort_by_weight();
        assert!(graph.is_sorted());
        // Both edges weigh 100, so construction order is kept.
        assert_eq!(graph.edges(), before.as_slice());
    }

    #[test]
    fn test_color_distance_is_symmetric() {
        let a = Rgb([10, 20, 30]);
        let b = Rgb([13, 24, 30]);
        assert_eq!(color_distance(&a, &b), 5.0);
        assert_eq!(color_distance(&a, &b), color_distance(&b, &a));
        assert_eq!(color_distance(&a, &a), 0.0);
    }

    #[test]
    fn test_weights_follow_colors() {
        let image = RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 {
                Rgb([0, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });
        let graph = PixelGraph::build(&image, Connectivity::Four);
        assert_eq!(
            graph.edges(),
            &[Edge {
                source: 0,
                destination: 1,
                weight: 255.0
            }]
        );
    }
}

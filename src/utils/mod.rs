pub mod geometry;

pub use geometry::{Point, Rectangle, Size};

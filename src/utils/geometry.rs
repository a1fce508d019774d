use serde::{Deserialize, Serialize};

/// A position in logical compositor coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Point {
    fn from((x, y): (f64, f64)) -> Self {
        Self { x, y }
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self {
            x: x as f64,
            y: y as f64,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub w: f64,
    pub h: f64,
}

impl Size {
    pub const fn new(w: f64, h: f64) -> Self {
        Self { w, h }
    }
}

/// An axis aligned rectangle, `loc` is the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rectangle {
    pub loc: Point,
    pub size: Size,
}

impl Rectangle {
    pub const fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self {
            loc: Point { x, y },
            size: Size { w, h },
        }
    }

    pub fn right(&self) -> f64 {
        self.loc.x + self.size.w
    }

    pub fn bottom(&self) -> f64 {
        self.loc.y + self.size.h
    }

    /// Half-open containment: the right and bottom edges are outside
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.loc.x
            && point.x < self.right()
            && point.y >= self.loc.y
            && point.y < self.bottom()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contains_is_half_open() {
        let rect = Rectangle::new(10.0, 10.0, 100.0, 20.0);
        assert!(rect.contains(Point::new(10.0, 10.0)));
        assert!(rect.contains(Point::new(109.9, 29.9)));
        assert!(!rect.contains(Point::new(110.0, 15.0)));
        assert!(!rect.contains(Point::new(50.0, 30.0)));
        assert!(!rect.contains(Point::new(9.9, 15.0)));
    }
}

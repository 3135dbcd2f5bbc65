use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Map a normalized point onto a `width` x `height` image.
    pub fn to_pixels(&self, width: u32, height: u32) -> Point {
        Point::new(self.x * width as f32, self.y * height as f32)
    }
}

/// Axis-aligned box in pixel coordinates, `(x1, y1)` top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub const fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    /// Map from a resized image back onto the original.
    pub fn scaled(&self, sx: f32, sy: f32) -> BoundingBox {
        BoundingBox::new(self.x1 * sx, self.y1 * sy, self.x2 * sx, self.y2 * sy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert_eq!(a.distance(&b), 5.0);
    }

    #[test]
    fn test_to_pixels() {
        let p = Point::new(0.5, 0.25).to_pixels(640, 480);
        assert_eq!(p, Point::new(320.0, 120.0));
    }

    #[test]
    fn test_scaled_box() {
        let b = BoundingBox::new(10.0, 20.0, 30.0, 60.0).scaled(2.0, 2.0);
        assert_eq!(b, BoundingBox::new(20.0, 40.0, 60.0, 120.0));
        assert_eq!(b.width(), 40.0);
        assert_eq!(b.height(), 80.0);
    }
}

//! Points, rectangles, transformation matrices and colors
//!
//! All coordinates are PDF user space: origin at the bottom-left of the page,
//! y growing upward.

/// A point in user space
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Create a rectangle, normalizing the corner order
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Smallest rectangle containing all the given points
    pub fn from_points(points: &[Point]) -> Self {
        let mut rect = Rect {
            x0: f32::INFINITY,
            y0: f32::INFINITY,
            x1: f32::NEG_INFINITY,
            y1: f32::NEG_INFINITY,
        };
        for p in points {
            rect.x0 = rect.x0.min(p.x);
            rect.y0 = rect.y0.min(p.y);
            rect.x1 = rect.x1.max(p.x);
            rect.y1 = rect.y1.max(p.y);
        }
        if points.is_empty() {
            Rect::default()
        } else {
            rect
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// True when the rectangle has no area
    pub fn is_empty(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// Union of two rectangles. An empty rectangle does not contribute.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Lower-left corner
    pub fn bottom_left(&self) -> Point {
        Point::new(self.x0, self.y0)
    }
}

/// Represents a PDF transformation matrix [a b c d e f]
/// where: x' = a*x + c*y + e, y' = b*x + d*y + f
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Identity matrix (no transformation)
    pub fn identity() -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: 0.0, f: 0.0 }
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self { a: 1.0, b: 0.0, c: 0.0, d: 1.0, e: tx, f: ty }
    }

    /// Build from a six-number PDF array, if it has six numbers
    pub fn from_slice(nums: &[f32]) -> Option<Self> {
        match nums {
            [a, b, c, d, e, f] => Some(Self::new(*a, *b, *c, *d, *e, *f)),
            _ => None,
        }
    }

    /// Apply `self` first, then `other`
    ///
    /// With PDF's row-vector convention this is the product `self × other`,
    /// which is what `cm` does: `CTM' = M × CTM`.
    pub fn concat(&self, other: &Matrix) -> Matrix {
        Matrix {
            a: self.a * other.a + self.b * other.c,
            b: self.a * other.b + self.b * other.d,
            c: self.c * other.a + self.d * other.c,
            d: self.c * other.b + self.d * other.d,
            e: self.e * other.a + self.f * other.c + other.e,
            f: self.e * other.b + self.f * other.d + other.f,
        }
    }

    pub fn transform_point(&self, p: Point) -> Point {
        Point {
            x: self.a * p.x + self.c * p.y + self.e,
            y: self.b * p.x + self.d * p.y + self.f,
        }
    }
}

/// An RGB color with components in 0..=1
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0 };

    pub fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self {
            r: r.clamp(0.0, 1.0),
            g: g.clamp(0.0, 1.0),
            b: b.clamp(0.0, 1.0),
        }
    }

    pub fn gray(g: f32) -> Self {
        Self::rgb(g, g, g)
    }

    pub fn cmyk(c: f32, m: f32, y: f32, k: f32) -> Self {
        Self::rgb(
            (1.0 - c) * (1.0 - k),
            (1.0 - m) * (1.0 - k),
            (1.0 - y) * (1.0 - k),
        )
    }

    /// Convert a packed sRGB integer (0xRRGGBB) back to a PDF color triple
    pub fn from_srgb(value: u32) -> Self {
        let r = (value >> 16) & 0xFF;
        let g = (value >> 8) & 0xFF;
        let b = value & 0xFF;
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    /// Pack into an sRGB integer (0xRRGGBB)
    pub fn to_srgb(&self) -> u32 {
        let channel = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u32;
        (channel(self.r) << 16) | (channel(self.g) << 8) | channel(self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_union_ignores_empty() {
        let a = Rect::new(10.0, 10.0, 20.0, 20.0);
        let empty = Rect::default();
        assert_eq!(a.union(&empty), a);
        assert_eq!(empty.union(&a), a);

        let b = Rect::new(15.0, 5.0, 30.0, 12.0);
        assert_eq!(a.union(&b), Rect::new(10.0, 5.0, 30.0, 20.0));
    }

    #[test]
    fn test_rect_new_normalizes() {
        let r = Rect::new(20.0, 30.0, 10.0, 5.0);
        assert_eq!(r.x0, 10.0);
        assert_eq!(r.y0, 5.0);
        assert_eq!(r.width(), 10.0);
        assert_eq!(r.height(), 25.0);
        assert_eq!(r.bottom_left(), Point::new(10.0, 5.0));
    }

    #[test]
    fn test_matrix_concat_order() {
        // Scale by 2, then translate by (10, 0)
        let scale = Matrix::new(2.0, 0.0, 0.0, 2.0, 0.0, 0.0);
        let shift = Matrix::translate(10.0, 0.0);
        let m = scale.concat(&shift);
        let p = m.transform_point(Point::new(1.0, 1.0));
        assert_eq!(p, Point::new(12.0, 2.0));
    }

    #[test]
    fn test_matrix_from_slice() {
        let m = Matrix::from_slice(&[1.0, 0.0, 0.0, 1.0, 36.0, 72.0]).unwrap();
        assert_eq!(m, Matrix::translate(36.0, 72.0));
        assert!(Matrix::from_slice(&[1.0, 0.0]).is_none());
    }

    #[test]
    fn test_color_from_srgb() {
        let c = Color::from_srgb(0xFF8000);
        assert_eq!(c.r, 1.0);
        assert!((c.g - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(c.b, 0.0);
        assert_eq!(c.to_srgb(), 0xFF8000);
    }

    #[test]
    fn test_color_conversions() {
        assert_eq!(Color::gray(0.0).to_srgb(), 0x000000);
        assert_eq!(Color::cmyk(0.0, 0.0, 0.0, 0.0).to_srgb(), 0xFFFFFF);
        assert_eq!(Color::cmyk(1.0, 0.0, 0.0, 0.0).to_srgb(), 0x00FFFF);
    }
}

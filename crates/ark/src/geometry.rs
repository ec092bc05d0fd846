use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

pub const fn vec2(x: f64, y: f64) -> Vector {
    Vector { x, y }
}

impl Vector {
    pub const ZERO: Vector = Vector { x: 0.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn add(self, other: Vector) -> Vector {
        Vector {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }

    pub fn sub(self, other: Vector) -> Vector {
        Vector {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }

    pub fn scale(self, factor: f64) -> Vector {
        Vector {
            x: self.x * factor,
            y: self.y * factor,
        }
    }

    /// Component-wise remainder; the sign follows the dividend.
    pub fn rem(self, modulus: f64) -> Vector {
        Vector {
            x: self.x % modulus,
            y: self.y % modulus,
        }
    }

    pub fn magnitude(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, rhs: Vector) -> Vector {
        Vector::add(self, rhs)
    }
}

impl Sub for Vector {
    type Output = Vector;

    fn sub(self, rhs: Vector) -> Vector {
        Vector::sub(self, rhs)
    }
}

impl Mul<f64> for Vector {
    type Output = Vector;

    fn mul(self, rhs: f64) -> Vector {
        self.scale(rhs)
    }
}

impl Neg for Vector {
    type Output = Vector;

    fn neg(self) -> Vector {
        self.scale(-1.0)
    }
}

/// Axis-aligned box described by its center and full width/height.
///
/// Overlap tests are strict: boxes that only share an edge neither
/// intersect nor contain one another.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    pub center: Vector,
    pub dimensions: Vector,
}

impl Rectangle {
    pub const fn new(center: Vector, dimensions: Vector) -> Self {
        Self { center, dimensions }
    }

    pub fn from_edges(left: f64, top: f64, right: f64, bottom: f64) -> Self {
        Self {
            center: vec2((left + right) * 0.5, (top + bottom) * 0.5),
            dimensions: vec2(right - left, bottom - top),
        }
    }

    /// True when either side has no extent; hidden visuals report this.
    pub fn is_empty(&self) -> bool {
        !(self.dimensions.x > 0.0 && self.dimensions.y > 0.0)
    }

    pub fn half_extents(&self) -> Vector {
        self.dimensions.scale(0.5)
    }

    pub fn top_left(&self) -> Vector {
        self.center - self.half_extents()
    }

    pub fn bottom_right(&self) -> Vector {
        self.center + self.half_extents()
    }

    pub fn top_right(&self) -> Vector {
        self.center + vec2(self.dimensions.x * 0.5, -self.dimensions.y * 0.5)
    }

    pub fn bottom_left(&self) -> Vector {
        self.center + vec2(-self.dimensions.x * 0.5, self.dimensions.y * 0.5)
    }

    /// `point` is a rectangle whose center is tested; its own size is ignored.
    pub fn contains(&self, point: &Rectangle) -> bool {
        self.contains_point(point.center)
    }

    pub fn contains_point(&self, point: Vector) -> bool {
        let to_point = self.center - point;
        to_point.x.abs() < self.dimensions.x * 0.5 && to_point.y.abs() < self.dimensions.y * 0.5
    }

    pub fn intersects(&self, other: &Rectangle) -> bool {
        let to_other = self.center - other.center;
        to_other.x.abs() < (self.dimensions.x + other.dimensions.x) * 0.5
            && to_other.y.abs() < (self.dimensions.y + other.dimensions.y) * 0.5
    }
}

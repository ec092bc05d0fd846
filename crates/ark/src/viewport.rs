use thiserror::Error;

use crate::geometry::{vec2, Rectangle, Vector};

pub const DEFAULT_SCALE_PERCENT: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ViewportError {
    #[error("viewport scale must be a finite positive percentage, got {scale_percent}")]
    Degenerate { scale_percent: f64 },
}

/// Camera window over the world plane.
///
/// `rect.center` is the world point shown at the middle of the window and
/// `rect.dimensions` is the window size in screen pixels. `scale_percent`
/// is always finite and strictly positive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    rect: Rectangle,
    scale_percent: f64,
}

impl Viewport {
    pub fn new(window_size: Vector) -> Self {
        Self {
            rect: Rectangle::new(Vector::ZERO, window_size),
            scale_percent: DEFAULT_SCALE_PERCENT,
        }
    }

    pub fn with_scale(window_size: Vector, scale_percent: f64) -> Result<Self, ViewportError> {
        let mut viewport = Self::new(window_size);
        viewport.set_scale_percent(scale_percent)?;
        Ok(viewport)
    }

    pub fn rect(&self) -> Rectangle {
        self.rect
    }

    pub fn center(&self) -> Vector {
        self.rect.center
    }

    pub fn scale_percent(&self) -> f64 {
        self.scale_percent
    }

    pub fn scale_factor(&self) -> f64 {
        self.scale_percent / 100.0
    }

    pub fn reset(&mut self, rect: Rectangle, scale_percent: f64) -> Result<(), ViewportError> {
        validate_scale(scale_percent)?;
        self.rect = rect;
        self.scale_percent = scale_percent;
        Ok(())
    }

    pub fn set_scale_percent(&mut self, scale_percent: f64) -> Result<(), ViewportError> {
        validate_scale(scale_percent)?;
        self.scale_percent = scale_percent;
        Ok(())
    }

    pub fn set_center(&mut self, center: Vector) {
        self.rect.center = center;
    }

    /// Adjusts the scale by whole steps and clamps it into `[min, max]`.
    /// Returns true when the scale changed; NaN or inverted bounds change
    /// nothing.
    pub fn zoom_steps(&mut self, steps: i32, step_percent: f64, min: f64, max: f64) -> bool {
        if steps == 0 || min.is_nan() || max.is_nan() || min > max {
            return false;
        }
        let target = (self.scale_percent + steps as f64 * step_percent).clamp(min, max);
        if validate_scale(target).is_err() || target == self.scale_percent {
            return false;
        }
        self.scale_percent = target;
        true
    }

    /// Picks up the current window size. Returns true when it changed.
    pub fn step(&mut self, window_size: Vector) -> bool {
        if self.rect.dimensions == window_size {
            return false;
        }
        self.rect.dimensions = window_size;
        true
    }

    pub fn screen_to_world(&self, screen: Vector) -> Vector {
        screen
            .sub(self.rect.dimensions.scale(0.5))
            .scale(100.0 / self.scale_percent)
            .add(self.rect.center)
    }

    pub fn world_to_screen(&self, world: Vector) -> Vector {
        world
            .sub(self.rect.center)
            .scale(self.scale_percent / 100.0)
            .add(self.rect.dimensions.scale(0.5))
    }

    /// True when a box of `size` (already scaled) centered at `screen` overlaps
    /// the window at all.
    pub fn shows(&self, screen: Vector, size: Vector) -> bool {
        let half = size.scale(0.5);
        let window = self.rect.dimensions;
        !(screen.x + half.x < 0.0
            || screen.x - half.x > window.x
            || screen.y + half.y < 0.0
            || screen.y - half.y > window.y)
    }

    pub fn window_center(&self) -> Vector {
        vec2(self.rect.dimensions.x * 0.5, self.rect.dimensions.y * 0.5)
    }
}

fn validate_scale(scale_percent: f64) -> Result<(), ViewportError> {
    if scale_percent.is_finite() && scale_percent > 0.0 {
        Ok(())
    } else {
        Err(ViewportError::Degenerate { scale_percent })
    }
}

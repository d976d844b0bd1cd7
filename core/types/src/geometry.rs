//! View geometry
//!
//! Nested visuals store coordinates relative to their parent visual; the two
//! point types keep the spaces from being mixed accidentally.

use serde::{Deserialize, Serialize};

/// Position + size of a visual object, in its containing coordinate space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

impl Default for Bounds {
    fn default() -> Self {
        // Default element box used when a BOM omits geometry
        Self { x: 0.0, y: 0.0, width: 120.0, height: 55.0 }
    }
}

/// A point in view-root space
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AbsolutePoint {
    pub x: f64,
    pub y: f64,
}

/// A point relative to a parent visual's top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParentRelativePoint {
    pub x: f64,
    pub y: f64,
}

impl ParentRelativePoint {
    /// Convert to view-root space given the parent's absolute origin
    pub fn to_absolute(self, parent_origin: AbsolutePoint) -> AbsolutePoint {
        AbsolutePoint {
            x: parent_origin.x + self.x,
            y: parent_origin.y + self.y,
        }
    }
}

impl AbsolutePoint {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Re-express in the space of a parent with the given absolute origin
    pub fn to_parent_relative(self, parent_origin: AbsolutePoint) -> ParentRelativePoint {
        ParentRelativePoint {
            x: self.x - parent_origin.x,
            y: self.y - parent_origin.y,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_round_trips_through_absolute() {
        let parent = AbsolutePoint::new(50.0, 50.0);
        let rel = ParentRelativePoint { x: 10.0, y: 30.0 };
        let abs = rel.to_absolute(parent);
        assert_eq!(abs, AbsolutePoint::new(60.0, 80.0));
        let back = abs.to_parent_relative(parent);
        assert_eq!(back.x, 10.0);
        assert_eq!(back.y, 30.0);
    }
}

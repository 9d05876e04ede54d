use serde::{Deserialize, Serialize};

pub mod action;
pub mod agent;
pub mod config;
pub mod environment;
pub mod food;
pub mod map;
pub mod perception;
pub mod qtable;
pub mod sarsa;
pub mod snake;
pub mod training;

/// Represents a 2D board coordinate.
///
/// `(0, 0)` is the top-left corner of the wall ring and `y` grows downward,
/// so "north" is `y - 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: i32,
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns this position moved by `(dx, dy)`.
    #[inline]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }

    /// Euclidean distance between two cells.
    pub fn distance_to(self, other: Position) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

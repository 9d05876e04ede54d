use serde::{Deserialize, Serialize};

use crate::snake::Heading;

/// A move relative to the current heading. There is no reverse move, so a
/// 180 degree turn can never be requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelativeAction {
    Left,
    Front,
    Right,
}

impl RelativeAction {
    /// All actions in Q-row order.
    pub const ALL: [RelativeAction; 3] = [
        RelativeAction::Left,
        RelativeAction::Front,
        RelativeAction::Right,
    ];

    /// Column of this action in a Q-table row.
    #[inline]
    pub const fn index(self) -> usize {
        match self {
            RelativeAction::Left => 0,
            RelativeAction::Front => 1,
            RelativeAction::Right => 2,
        }
    }
}

/// Translates `action` into the absolute heading it produces from `heading`.
///
/// Turning left maps `(dx, 0)` to `(0, -dx)` and `(0, dy)` to `(dy, 0)`;
/// turning right is the mirror image. With `y` growing downward this makes
/// left a counter-clockwise turn on screen.
pub fn to_absolute(action: RelativeAction, heading: Heading) -> Heading {
    match (action, heading) {
        (RelativeAction::Front, heading) => heading,
        (RelativeAction::Left, Heading::East) => Heading::North,
        (RelativeAction::Left, Heading::North) => Heading::West,
        (RelativeAction::Left, Heading::West) => Heading::South,
        (RelativeAction::Left, Heading::South) => Heading::East,
        (RelativeAction::Right, Heading::East) => Heading::South,
        (RelativeAction::Right, Heading::South) => Heading::West,
        (RelativeAction::Right, Heading::West) => Heading::North,
        (RelativeAction::Right, Heading::North) => Heading::East,
    }
}

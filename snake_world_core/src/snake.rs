use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{Position, map::GridWorld};

/// Absolute direction of travel. Only the four axis-aligned headings exist,
/// so a diagonal or zero heading cannot be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Heading {
    North,
    South,
    East,
    West,
}

/// Rejected direction request.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeadingError {
    #[error("direction ({dx}, {dy}) must have exactly one non-zero unit component")]
    NotAxisAligned { dx: i32, dy: i32 },
}

impl Heading {
    pub const ALL: [Heading; 4] = [Heading::North, Heading::South, Heading::East, Heading::West];

    /// Returns the movement vector `(dx, dy)` for this heading.
    pub const fn delta(self) -> (i32, i32) {
        match self {
            Heading::North => (0, -1),
            Heading::South => (0, 1),
            Heading::East => (1, 0),
            Heading::West => (-1, 0),
        }
    }

    pub fn from_delta(dx: i32, dy: i32) -> Result<Self, HeadingError> {
        match (dx, dy) {
            (0, -1) => Ok(Heading::North),
            (0, 1) => Ok(Heading::South),
            (1, 0) => Ok(Heading::East),
            (-1, 0) => Ok(Heading::West),
            _ => Err(HeadingError::NotAxisAligned { dx, dy }),
        }
    }
}

impl TryFrom<(i32, i32)> for Heading {
    type Error = HeadingError;

    fn try_from((dx, dy): (i32, i32)) -> Result<Self, Self::Error> {
        Heading::from_delta(dx, dy)
    }
}

/// The snake: occupied cells ordered head first, plus the current heading.
///
/// Movement shifts every cell onto its predecessor and then advances the
/// head, which a ring buffer does as one push at the front and one pop at
/// the back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnakeBody {
    cells: VecDeque<Position>,
    heading: Heading,
}

impl SnakeBody {
    pub fn new(head: Position, heading: Heading) -> Self {
        Self {
            cells: VecDeque::from([head]),
            heading,
        }
    }

    /// A length-1 snake heading north, near the bottom centre of `world`.
    pub fn spawn(world: &GridWorld) -> Self {
        let x = (world.width() as i32 + 2) / 2;
        let y = world.height() as i32 - 1;
        Self::new(Position::new(x, y), Heading::North)
    }

    #[inline]
    pub fn head(&self) -> Position {
        self.cells[0]
    }

    #[inline]
    pub fn heading(&self) -> Heading {
        self.heading
    }

    pub fn set_heading(&mut self, heading: Heading) {
        self.heading = heading;
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells from head to tail.
    pub fn cells(&self) -> impl Iterator<Item = Position> + '_ {
        self.cells.iter().copied()
    }

    /// Moves one cell along the current heading.
    pub fn advance(&mut self) {
        let (dx, dy) = self.heading.delta();
        let head = self.head().offset(dx, dy);
        self.cells.push_front(head);
        self.cells.pop_back();
    }

    /// Grows by one cell by duplicating the tail; the copies separate on the
    /// next move.
    pub fn grow(&mut self) {
        let tail = self.cells[self.cells.len() - 1];
        self.cells.push_back(tail);
    }

    /// True if `pos` is covered by any cell other than the head.
    pub fn is_on_body(&self, pos: Position) -> bool {
        self.cells.iter().skip(1).any(|&cell| cell == pos)
    }

    pub fn is_on_head(&self, pos: Position) -> bool {
        self.head() == pos
    }

    pub fn occupies(&self, pos: Position) -> bool {
        self.cells.contains(&pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_from_delta() {
        for heading in Heading::ALL {
            let (dx, dy) = heading.delta();
            assert_eq!(Heading::from_delta(dx, dy), Ok(heading));
        }
        assert!(Heading::try_from((1, 1)).is_err());
        assert!(Heading::try_from((0, 0)).is_err());
        assert!(Heading::try_from((2, 0)).is_err());
    }

    #[test]
    fn test_spawn_near_bottom_centre() {
        let world = GridWorld::new(15, 20);
        let snake = SnakeBody::spawn(&world);
        assert_eq!(snake.head(), Position::new(8, 19));
        assert_eq!(snake.heading(), Heading::North);
        assert_eq!(snake.len(), 1);
    }

    #[test]
    fn test_advance_shifts_body() {
        let mut snake = SnakeBody::new(Position::new(5, 5), Heading::East);
        snake.grow();
        snake.advance();
        snake.grow();
        snake.advance();
        let cells: Vec<Position> = snake.cells().collect();
        assert_eq!(
            cells,
            vec![Position::new(7, 5), Position::new(6, 5), Position::new(5, 5)]
        );

        snake.set_heading(Heading::South);
        snake.advance();
        let cells: Vec<Position> = snake.cells().collect();
        assert_eq!(
            cells,
            vec![Position::new(7, 6), Position::new(7, 5), Position::new(6, 5)]
        );
    }

    #[test]
    fn test_grow_duplicates_tail() {
        let mut snake = SnakeBody::new(Position::new(2, 2), Heading::North);
        snake.grow();
        assert_eq!(snake.len(), 2);
        assert!(snake.is_on_body(Position::new(2, 2)));
        snake.advance();
        assert_eq!(snake.head(), Position::new(2, 1));
        assert!(snake.is_on_body(Position::new(2, 2)));
        assert!(!snake.is_on_body(snake.head()));
    }

    #[test]
    fn test_consecutive_cells_adjacent() {
        let mut snake = SnakeBody::new(Position::new(5, 5), Heading::East);
        for _ in 0..4 {
            snake.grow();
            snake.advance();
        }
        snake.set_heading(Heading::North);
        snake.advance();
        let cells: Vec<Position> = snake.cells().collect();
        for pair in cells.windows(2) {
            let dx = (pair[0].x - pair[1].x).abs();
            let dy = (pair[0].y - pair[1].y).abs();
            assert_eq!(dx.max(dy), 1);
        }
    }
}

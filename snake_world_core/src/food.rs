use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};

use crate::{Position, map::GridWorld, snake::SnakeBody};

/// Food never spawns closer than this to the head.
pub const MIN_HEAD_DISTANCE: f64 = 2.0;

/// Random draws tried before falling back to enumerating free cells.
const RANDOM_ATTEMPTS: usize = 256;

/// Owns the single food cell and places it on request.
#[derive(Debug, Clone)]
pub struct FoodSpawner {
    location: Position,
    rng: StdRng,
}

impl FoodSpawner {
    /// Creates a spawner; `seed` makes placements reproducible.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            location: Position::new(0, 0),
            rng,
        }
    }

    #[inline]
    pub fn location(&self) -> Position {
        self.location
    }

    /// Forces the food onto `pos` without any checks.
    pub fn place_at(&mut self, pos: Position) {
        self.location = pos;
    }

    /// Whether `pos` satisfies the spawn invariant for `snake`.
    pub fn is_valid_spot(snake: &SnakeBody, pos: Position) -> bool {
        !snake.occupies(pos) && snake.head().distance_to(pos) >= MIN_HEAD_DISTANCE
    }

    /// Start-of-round placement, restricted to the top half of the interior.
    pub fn place_initial(&mut self, world: &GridWorld, snake: &SnakeBody) -> Option<Position> {
        let max_y = (world.height() / 2).max(1) as i32;
        self.place_within(world, snake, max_y)
    }

    /// Placement anywhere in the interior, used after the food is eaten.
    pub fn place_random(&mut self, world: &GridWorld, snake: &SnakeBody) -> Option<Position> {
        self.place_within(world, snake, world.height() as i32)
    }

    /// Draws uniformly from interior rows `1..=max_y` until a valid spot
    /// turns up. Returns `None` and leaves the food in place only when no
    /// valid cell exists.
    fn place_within(&mut self, world: &GridWorld, snake: &SnakeBody, max_y: i32) -> Option<Position> {
        let max_x = world.width() as i32;
        for _ in 0..RANDOM_ATTEMPTS {
            let candidate = Position::new(
                self.rng.random_range(1..=max_x),
                self.rng.random_range(1..=max_y),
            );
            if Self::is_valid_spot(snake, candidate) {
                self.location = candidate;
                return Some(candidate);
            }
        }

        // Crowded board: choose among the remaining valid cells directly.
        let free: Vec<Position> = world
            .interior_cells()
            .filter(|pos| pos.y <= max_y && Self::is_valid_spot(snake, *pos))
            .collect();
        let chosen = free.choose(&mut self.rng).copied()?;
        self.location = chosen;
        Some(chosen)
    }
}

use serde::{Deserialize, Serialize};

use crate::{
    Position,
    config::{ConfigError, WorldConfig},
    food::FoodSpawner,
    map::{GridWorld, Terrain},
    snake::{Heading, SnakeBody},
};

/// Result of a single simulation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Outcome {
    Running,
    Pause,
    CrashedToWall,
    CrashedToBody,
    ReachedFood,
}

impl Outcome {
    /// Crashes end the episode.
    pub fn is_crash(self) -> bool {
        matches!(self, Outcome::CrashedToWall | Outcome::CrashedToBody)
    }
}

/// What occupies a board cell, as seen by the perception layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Vision {
    Wall,
    Food,
    Body,
    Head,
    Space,
    OutOfScope,
}

/// The deterministic snake simulation: world, snake and food together.
#[derive(Debug, Clone)]
pub struct GridSimulation {
    world: GridWorld,
    snake: SnakeBody,
    food: FoodSpawner,
    score: u32,
    paused: bool,
}

impl GridSimulation {
    /// Creates a simulation and performs the first `restart`.
    ///
    /// # Panics
    ///
    /// Panics if the board is smaller than
    /// [`MIN_WIDTH`](crate::config::MIN_WIDTH) x
    /// [`MIN_HEIGHT`](crate::config::MIN_HEIGHT). Use
    /// [`GridSimulation::try_new`] for unchecked input.
    pub fn new(config: &WorldConfig) -> Self {
        match Self::try_new(config) {
            Ok(simulation) => simulation,
            Err(err) => panic!("invalid world configuration: {err}"),
        }
    }

    /// Validates `config`, then creates the simulation.
    pub fn try_new(config: &WorldConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: &WorldConfig) -> Self {
        let world = GridWorld::new(config.width, config.height);
        let snake = SnakeBody::spawn(&world);
        let mut simulation = Self {
            world,
            snake,
            food: FoodSpawner::new(config.seed),
            score: 0,
            paused: true,
        };
        simulation.restart();
        simulation
    }

    /// Resets the snake, the score and the food for a new round. The world
    /// comes back paused.
    pub fn restart(&mut self) {
        self.score = 0;
        self.paused = true;
        self.snake = SnakeBody::spawn(&self.world);
        if self.food.place_initial(&self.world, &self.snake).is_none() {
            tracing::warn!("no valid cell for the initial food placement");
        }
    }

    /// Sets the heading used by the next `step`. Ignored while paused.
    pub fn change_direction(&mut self, heading: Heading) {
        if self.paused {
            return;
        }
        self.snake.set_heading(heading);
    }

    /// Advances the snake one cell and reports what happened.
    ///
    /// Checks run in a fixed order: wall, body, food.
    pub fn step(&mut self) -> Outcome {
        if self.paused {
            return Outcome::Pause;
        }

        self.snake.advance();
        let head = self.snake.head();

        if !self.world.is_interior(head) {
            return Outcome::CrashedToWall;
        }
        if self.snake.is_on_body(head) {
            return Outcome::CrashedToBody;
        }
        if head == self.food.location() {
            self.score += 1;
            self.snake.grow();
            if self.food.place_random(&self.world, &self.snake).is_none() {
                tracing::warn!(score = self.score, "board is full, food left in place");
            }
            return Outcome::ReachedFood;
        }
        Outcome::Running
    }

    /// Classifies the cell at `pos`. Has no side effects.
    pub fn query_cell(&self, pos: Position) -> Vision {
        match self.world.terrain_at(pos) {
            None => Vision::OutOfScope,
            Some(Terrain::Wall) => Vision::Wall,
            Some(Terrain::Floor) if self.snake.is_on_body(pos) => Vision::Body,
            Some(Terrain::Floor) if self.snake.is_on_head(pos) => Vision::Head,
            Some(Terrain::Floor) if self.food.location() == pos => Vision::Food,
            Some(Terrain::Floor) => Vision::Space,
        }
    }

    /// Flips the pause flag and returns the new state.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        self.paused
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Forces the food onto `pos`, bypassing the spawn rules.
    pub fn place_food_at(&mut self, pos: Position) {
        self.food.place_at(pos);
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn head(&self) -> Position {
        self.snake.head()
    }

    pub fn heading(&self) -> Heading {
        self.snake.heading()
    }

    pub fn food(&self) -> Position {
        self.food.location()
    }

    pub fn snake(&self) -> &SnakeBody {
        &self.snake
    }

    pub fn world(&self) -> &GridWorld {
        &self.world
    }
}

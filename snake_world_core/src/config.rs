use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Smallest interior that keeps the initial food placement satisfiable.
pub const MIN_WIDTH: usize = 3;
pub const MIN_HEIGHT: usize = 6;

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed config file {path}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("board {width}x{height} is smaller than the minimum {}x{}", MIN_WIDTH, MIN_HEIGHT)]
    BoardTooSmall { width: usize, height: usize },
    #[error("{field} = {value} is outside {range}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        range: &'static str,
    },
}

/// Board configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Interior width, walls excluded
    pub width: usize,
    /// Interior height, walls excluded
    pub height: usize,
    /// Seed for food placement; `None` draws from the OS
    pub seed: Option<u64>,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            width: 15,
            height: 20,
            seed: None,
        }
    }
}

impl WorldConfig {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width < MIN_WIDTH || self.height < MIN_HEIGHT {
            return Err(ConfigError::BoardTooSmall {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// How epsilon shrinks between episodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecayMode {
    #[default]
    Exponential,
    Linear,
}

/// Exploration rate as a function of finished episodes.
///
/// Without a `factor` the rate stays at `initial` forever.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EpsilonSchedule {
    pub initial: f64,
    pub factor: Option<f64>,
    pub min: Option<f64>,
    pub mode: DecayMode,
}

impl Default for EpsilonSchedule {
    fn default() -> Self {
        Self::constant(0.05)
    }
}

impl EpsilonSchedule {
    pub fn constant(value: f64) -> Self {
        Self {
            initial: value,
            factor: None,
            min: None,
            mode: DecayMode::Exponential,
        }
    }

    pub fn exponential(initial: f64, factor: f64, min: f64) -> Self {
        Self {
            initial,
            factor: Some(factor),
            min: Some(min),
            mode: DecayMode::Exponential,
        }
    }

    pub fn linear(initial: f64, step: f64, min: f64) -> Self {
        Self {
            initial,
            factor: Some(step),
            min: Some(min),
            mode: DecayMode::Linear,
        }
    }

    /// Epsilon after `episodes` decay steps, never below `min` or zero.
    pub fn value_at(&self, episodes: u64) -> f64 {
        let Some(factor) = self.factor else {
            return self.initial;
        };
        let decayed = match self.mode {
            DecayMode::Exponential => {
                self.initial * factor.powi(i32::try_from(episodes).unwrap_or(i32::MAX))
            }
            DecayMode::Linear => self.initial - factor * episodes as f64,
        };
        decayed.max(self.min.unwrap_or(0.0)).max(0.0)
    }
}

/// What the update bootstraps from on a crash tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalPolicy {
    /// Use `Q(s', a')` like any other tick.
    #[default]
    Bootstrap,
    /// Treat the crash as terminal: future value is zero.
    Zero,
}

/// SARSA hyperparameters and reward schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SarsaConfig {
    /// Learning rate (alpha)
    pub alpha: f64,
    /// Discount factor (gamma)
    pub gamma: f64,
    /// Exploration schedule
    pub epsilon: EpsilonSchedule,
    /// Reward for reaching food
    pub food_reward: f64,
    /// Reward for either crash kind
    pub crash_reward: f64,
    /// When false the Q-table is frozen
    pub training: bool,
    pub terminal_policy: TerminalPolicy,
    /// Seed for exploration and tie-breaking
    pub seed: Option<u64>,
}

impl Default for SarsaConfig {
    fn default() -> Self {
        Self {
            alpha: 0.2,
            gamma: 0.9,
            epsilon: EpsilonSchedule::default(),
            food_reward: 10.0,
            crash_reward: -10.0,
            training: true,
            terminal_policy: TerminalPolicy::default(),
            seed: None,
        }
    }
}

impl SarsaConfig {
    /// Frozen table, purely greedy play.
    pub fn evaluation() -> Self {
        Self::default().into_evaluation()
    }

    /// Switches an existing configuration to evaluation mode.
    pub fn into_evaluation(self) -> Self {
        Self {
            training: false,
            epsilon: EpsilonSchedule::constant(0.0),
            ..self
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_unit("alpha", self.alpha)?;
        check_unit("gamma", self.gamma)?;
        check_unit("epsilon.initial", self.epsilon.initial)?;
        if let Some(min) = self.epsilon.min {
            check_unit("epsilon.min", min)?;
        }
        if let Some(factor) = self.epsilon.factor {
            if !factor.is_finite() || factor < 0.0 {
                return Err(ConfigError::OutOfRange {
                    field: "epsilon.factor",
                    value: factor,
                    range: "[0, inf)",
                });
            }
        }
        Ok(())
    }
}

fn check_unit(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            range: "[0, 1]",
        })
    }
}

/// Everything a run needs, as read from a JSON file. Missing sections fall
/// back to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub world: WorldConfig,
    pub sarsa: SarsaConfig,
}

impl RunConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RunConfig = serde_json::from_str(&text).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.world.validate()?;
        self.sarsa.validate()
    }
}

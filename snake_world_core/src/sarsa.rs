//! Tabular SARSA over the egocentric state encoding.
//!
//! SARSA updates `Q(s, a)` with the action `a'` that will actually be taken
//! next, so the agent picks `a'` while processing the outcome of `a` and
//! then plays it on the following tick. [`EpisodePhase`] tracks where the
//! agent is in that cycle.

use std::path::{Path, PathBuf};

use rand::{Rng, SeedableRng, rngs::StdRng, seq::IndexedRandom};

use crate::{
    action::{RelativeAction, to_absolute},
    agent::{Agent, AgentError},
    config::{SarsaConfig, TerminalPolicy},
    environment::Outcome,
    perception::{EgocentricState, SystemState, to_egocentric},
    qtable::{PersistError, QTable},
    snake::Heading,
};

/// Where the agent is within one decide/observe cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpisodePhase {
    /// Waiting for the host to ask for an action. `lookahead` is the action
    /// already chosen during the previous update, absent on the first tick.
    AwaitingAction { lookahead: Option<RelativeAction> },
    /// An action was handed out and its outcome has not arrived yet.
    ActionCommitted {
        state: EgocentricState,
        action: RelativeAction,
    },
    /// The last outcome was a crash. The next tick starts a fresh episode.
    EpisodeEnd,
}

/// The SARSA learner.
#[derive(Debug)]
pub struct SarsaAgent {
    config: SarsaConfig,
    table: QTable,
    phase: EpisodePhase,
    rng: StdRng,
    episodes: u64,
    save_path: Option<PathBuf>,
}

impl SarsaAgent {
    /// Creates an agent with an empty table.
    pub fn new(config: SarsaConfig) -> Self {
        Self::with_table(config, QTable::new())
    }

    pub fn with_table(config: SarsaConfig, table: QTable) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            config,
            table,
            phase: EpisodePhase::AwaitingAction { lookahead: None },
            rng,
            episodes: 0,
            save_path: None,
        }
    }

    /// Creates an agent seeded with the table stored at `path`, if any.
    pub fn load(config: SarsaConfig, path: &Path) -> Result<Self, PersistError> {
        Ok(Self::with_table(config, QTable::load(path)?))
    }

    /// Where [`Agent::on_terminate`] writes the table.
    pub fn save_to(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = Some(path.into());
        self
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut QTable {
        &mut self.table
    }

    pub fn config(&self) -> &SarsaConfig {
        &self.config
    }

    pub fn phase(&self) -> EpisodePhase {
        self.phase
    }

    /// Finished training episodes.
    pub fn episodes(&self) -> u64 {
        self.episodes
    }

    /// Exploration rate for the current episode. Always zero when the table
    /// is frozen.
    pub fn epsilon(&self) -> f64 {
        if !self.config.training {
            return 0.0;
        }
        self.config.epsilon.value_at(self.episodes)
    }

    /// Epsilon-greedy choice. Exploitation breaks ties between equally
    /// valued actions uniformly at random.
    pub fn select_action(&mut self, state: &EgocentricState) -> RelativeAction {
        if self.rng.random::<f64>() < self.epsilon() {
            return RelativeAction::ALL[self.rng.random_range(0..RelativeAction::ALL.len())];
        }

        let key = state.key();
        let row = if self.config.training {
            *self.table.row_mut(key)
        } else {
            self.table.row(key)
        };
        let best = row.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let tied: Vec<RelativeAction> = RelativeAction::ALL
            .into_iter()
            .filter(|action| row[action.index()] == best)
            .collect();
        tied.choose(&mut self.rng)
            .copied()
            .unwrap_or(RelativeAction::Front)
    }

    /// Reward earned by a step outcome.
    pub fn reward_for(&self, outcome: Outcome) -> f64 {
        match outcome {
            Outcome::ReachedFood => self.config.food_reward,
            Outcome::CrashedToWall | Outcome::CrashedToBody => self.config.crash_reward,
            Outcome::Running | Outcome::Pause => 0.0,
        }
    }

    /// Applies `Q(s,a) += alpha * (r + gamma * Q(s',a') - Q(s,a))`.
    ///
    /// `next` is `None` for a terminal transition, whose future value is
    /// zero. Does nothing when training is disabled.
    pub fn update(
        &mut self,
        state: &EgocentricState,
        action: RelativeAction,
        reward: f64,
        next: Option<(&EgocentricState, RelativeAction)>,
    ) {
        if !self.config.training {
            return;
        }
        let future = match next {
            Some((next_state, next_action)) => {
                self.table.row_mut(next_state.key())[next_action.index()]
            }
            None => 0.0,
        };
        let SarsaConfig { alpha, gamma, .. } = self.config;
        let q = &mut self.table.row_mut(state.key())[action.index()];
        *q += alpha * (reward + gamma * future - *q);
    }

    fn finish_episode(&mut self) {
        self.phase = EpisodePhase::EpisodeEnd;
        if self.config.training {
            self.episodes += 1;
        }
    }
}

impl Agent for SarsaAgent {
    fn name(&self) -> String {
        if self.config.training {
            "SARSA".to_string()
        } else {
            "SARSA (evaluation)".to_string()
        }
    }

    fn describe_state(&self, state: &SystemState) -> String {
        to_egocentric(state).to_string()
    }

    fn take_action(&mut self, state: &SystemState) -> Heading {
        let current = to_egocentric(state);
        let action = match self.phase {
            EpisodePhase::AwaitingAction {
                lookahead: Some(action),
            } => action,
            EpisodePhase::AwaitingAction { lookahead: None } | EpisodePhase::EpisodeEnd => {
                self.select_action(&current)
            }
            EpisodePhase::ActionCommitted { action, .. } => action,
        };
        self.phase = EpisodePhase::ActionCommitted {
            state: current,
            action,
        };
        to_absolute(action, state.heading)
    }

    fn observe_outcome(&mut self, state: &SystemState, outcome: Outcome) {
        let EpisodePhase::ActionCommitted {
            state: previous,
            action,
        } = self.phase
        else {
            tracing::warn!(?outcome, phase = ?self.phase, "outcome without a committed action");
            return;
        };
        if outcome == Outcome::Pause {
            // Nothing moved; the committed action stands for the next tick.
            return;
        }

        let next_state = to_egocentric(state);
        let reward = self.reward_for(outcome);

        if outcome.is_crash() {
            match self.config.terminal_policy {
                TerminalPolicy::Bootstrap => {
                    let next_action = self.select_action(&next_state);
                    self.update(&previous, action, reward, Some((&next_state, next_action)));
                }
                TerminalPolicy::Zero => self.update(&previous, action, reward, None),
            }
            self.finish_episode();
        } else {
            let next_action = self.select_action(&next_state);
            self.update(&previous, action, reward, Some((&next_state, next_action)));
            self.phase = EpisodePhase::AwaitingAction {
                lookahead: Some(next_action),
            };
        }
    }

    fn on_terminate(&mut self) -> Result<(), AgentError> {
        if let Some(path) = &self.save_path {
            self.table.save(path)?;
        }
        Ok(())
    }
}

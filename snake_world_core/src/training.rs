use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::{
    agent::{Agent, AgentError},
    environment::{GridSimulation, Outcome},
    perception::absolute_state,
};

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub outcome: Outcome,
    /// Score at the moment the step resolved, before any restart.
    pub score: u32,
    /// True when this tick crashed and the world was restarted.
    pub episode_finished: bool,
}

/// Running totals across episodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    /// Finished episodes
    pub rounds: u64,
    /// Simulation steps taken, pauses excluded
    pub ticks: u64,
    pub foods: u64,
    pub last_score: u32,
    pub high_score: u32,
}

/// Drives one agent against one simulation.
///
/// Each tick perceives, asks the agent for a heading, steps the world and
/// reports the outcome back. A crash ends the episode and restarts the
/// world. The agent's termination hook runs exactly once, either through
/// [`TrainingLoop::shutdown`] or when the loop is dropped.
pub struct TrainingLoop<A: Agent> {
    simulation: GridSimulation,
    agent: A,
    stats: RunStats,
    terminated: bool,
}

impl<A: Agent> TrainingLoop<A> {
    /// Wraps `simulation` and `agent`; the world is unpaused so ticks move.
    pub fn new(mut simulation: GridSimulation, agent: A) -> Self {
        simulation.set_paused(false);
        Self {
            simulation,
            agent,
            stats: RunStats::default(),
            terminated: false,
        }
    }

    pub fn simulation(&self) -> &GridSimulation {
        &self.simulation
    }

    pub fn simulation_mut(&mut self) -> &mut GridSimulation {
        &mut self.simulation
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    pub fn stats(&self) -> RunStats {
        self.stats
    }

    /// Runs one perceive, act, step, observe cycle.
    pub fn tick(&mut self) -> TickReport {
        if self.simulation.is_paused() {
            return TickReport {
                outcome: Outcome::Pause,
                score: self.simulation.score(),
                episode_finished: false,
            };
        }

        let before = absolute_state(&self.simulation);
        let heading = self.agent.take_action(&before);
        self.simulation.change_direction(heading);
        let outcome = self.simulation.step();
        let after = absolute_state(&self.simulation);
        self.agent.observe_outcome(&after, outcome);

        let score = self.simulation.score();
        self.stats.ticks += 1;
        if outcome == Outcome::ReachedFood {
            self.stats.foods += 1;
        }

        let episode_finished = outcome.is_crash();
        if episode_finished {
            self.stats.rounds += 1;
            self.stats.last_score = score;
            self.stats.high_score = self.stats.high_score.max(score);
            tracing::info!(
                round = self.stats.rounds,
                score,
                high_score = self.stats.high_score,
                ?outcome,
                "episode finished"
            );
            self.simulation.restart();
            self.simulation.set_paused(false);
        }

        TickReport {
            outcome,
            score,
            episode_finished,
        }
    }

    /// Ticks until `episodes` more episodes have finished.
    pub fn run_episodes(&mut self, episodes: u64) -> RunStats {
        let target = self.stats.rounds + episodes;
        self.simulation.set_paused(false);
        while self.stats.rounds < target {
            self.tick();
        }
        self.stats
    }

    /// Ticks until `stop` returns true; checked between ticks.
    pub fn run_until<F>(&mut self, mut stop: F) -> RunStats
    where
        F: FnMut(&RunStats) -> bool,
    {
        self.simulation.set_paused(false);
        while !stop(&self.stats) {
            self.tick();
        }
        self.stats
    }

    /// Ticks until `stop` is raised or, when given, `episodes` more episodes
    /// have finished. The flag is polled between ticks, so a signal handler
    /// can end the run without interrupting a step.
    pub fn run_until_stopped(&mut self, episodes: Option<u64>, stop: &AtomicBool) -> RunStats {
        let target = episodes.map(|episodes| self.stats.rounds + episodes);
        let stats = self.run_until(|stats| {
            stop.load(Ordering::Relaxed) || target.is_some_and(|target| stats.rounds >= target)
        });
        if stop.load(Ordering::Relaxed) {
            tracing::info!(rounds = stats.rounds, ticks = stats.ticks, "run interrupted");
        }
        stats
    }

    /// Gives the agent its termination callback. Later calls do nothing.
    pub fn shutdown(&mut self) -> Result<(), AgentError> {
        if self.terminated {
            return Ok(());
        }
        self.terminated = true;
        tracing::info!(agent = %self.agent.name(), rounds = self.stats.rounds, "shutting down");
        self.agent.on_terminate()
    }
}

impl<A: Agent> Drop for TrainingLoop<A> {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::error!(error = %err, "termination hook failed");
        }
    }
}

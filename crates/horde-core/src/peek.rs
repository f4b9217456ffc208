//! Peek controller: a per-agent timer state machine that briefly exposes a
//! hiding agent. While peeking, the orchestrator suppresses hide and
//! amplifies wander.

use crate::HordeConfig;
use glam::Vec2;
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

/// Idle/Peeking state machine. Idle agents roll a peek check at a fixed
/// interval once their cooldown has elapsed; the success chance decays
/// exponentially with local flock size, so dense clusters stay hidden.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeekController {
    peeking: bool,
    /// Seconds since the last peek ended (or since spawn).
    idle_elapsed: f32,
    /// Seconds since the last Bernoulli check.
    check_elapsed: f32,
    /// Sampled cooldown that must elapse before checks can succeed.
    cooldown: f32,
    peek_timer: f32,
    peek_duration: f32,
}

impl PeekController {
    /// Fresh controller with a randomized initial cooldown.
    #[must_use]
    pub fn new(config: &HordeConfig, rng: &mut dyn RngCore) -> Self {
        Self {
            peeking: false,
            idle_elapsed: 0.0,
            check_elapsed: 0.0,
            cooldown: rng.random_range(
                config.peek_initial_cooldown_min..=config.peek_initial_cooldown_max,
            ),
            peek_timer: 0.0,
            peek_duration: 0.0,
        }
    }

    /// Advance timers by `dt`. Returns the wander-target nudge to apply when
    /// a peek starts this tick, `None` otherwise.
    pub fn update(
        &mut self,
        config: &HordeConfig,
        dt: f32,
        neighbor_count: usize,
        rng: &mut dyn RngCore,
    ) -> Option<Vec2> {
        if self.peeking {
            self.peek_timer += dt;
            if self.peek_timer >= self.peek_duration {
                self.peeking = false;
                self.idle_elapsed = 0.0;
                self.check_elapsed = 0.0;
                self.cooldown =
                    rng.random_range(config.peek_cooldown_min..=config.peek_cooldown_max);
            }
            return None;
        }

        self.idle_elapsed += dt;
        self.check_elapsed += dt;
        if self.check_elapsed < config.peek_check_interval {
            return None;
        }
        self.check_elapsed = 0.0;
        if self.idle_elapsed < self.cooldown {
            return None;
        }

        let chance = (config.peek_base_chance
            * (-config.peek_group_scale * neighbor_count as f64).exp())
        .clamp(0.0, 1.0);
        if !rng.random_bool(chance) {
            return None;
        }

        self.peeking = true;
        self.peek_timer = 0.0;
        self.peek_duration =
            rng.random_range(config.peek_duration_min..=config.peek_duration_max);
        let nudge = config.peek_wander_nudge;
        Some(Vec2::new(
            rng.random_range(-nudge..=nudge),
            rng.random_range(-nudge..=nudge),
        ))
    }

    /// True while the agent is exposed from cover.
    #[must_use]
    pub fn is_peeking(&self) -> bool {
        self.peeking
    }
}

//! Evasive "No" button.
//!
//! Each proximity trigger picks a point in an annulus around the button's
//! layout slot (distance uniform in `[min, max]`, angle uniform in `[0, 2π)`)
//! and the page animates the button there with a CSS transition. While that
//! transition runs the controller is `Moving` and swallows further triggers.

use rand::Rng;
use std::f64::consts::TAU;

use crate::config::EvasionConfig;

/// Offset from the button's layout position, in CSS pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Displacement {
    pub dx: f64,
    pub dy: f64,
}

impl Displacement {
    /// Sample a polar offset with magnitude in `[min, max]`.
    pub fn sample<R: Rng + ?Sized>(rng: &mut R, min: f64, max: f64) -> Self {
        // Interpolated rather than `gen_range`, which panics when `max - min` overflows.
        let distance = if max > min { (min + rng.r#gen::<f64>() * (max - min)).min(max) } else { min };
        let angle = rng.gen_range(0.0..TAU);
        Self { dx: angle.cos() * distance, dy: angle.sin() * distance }
    }

    pub fn magnitude(&self) -> f64 {
        self.dx.hypot(self.dy)
    }

    /// Value for `style.transform`.
    pub fn css_transform(&self) -> String {
        format!("translate({:.2}px, {:.2}px)", self.dx, self.dy)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum EvasionState {
    AtRest,
    Moving { since_ms: f64 },
}

pub struct EvasionController {
    cfg: EvasionConfig,
    state: EvasionState,
    relocations: u32,
}

impl EvasionController {
    pub fn new(cfg: EvasionConfig) -> Self {
        Self { cfg, state: EvasionState::AtRest, relocations: 0 }
    }

    pub fn state(&self) -> EvasionState {
        self.state
    }

    pub fn relocations(&self) -> u32 {
        self.relocations
    }

    pub fn transition(&self) -> &str {
        &self.cfg.transition
    }

    /// Drop back to `AtRest` once the cooldown has elapsed.
    pub fn settle(&mut self, now_ms: f64) {
        if let EvasionState::Moving { since_ms } = self.state {
            if now_ms - since_ms >= self.cfg.cooldown_ms as f64 {
                self.state = EvasionState::AtRest;
            }
        }
    }

    /// Handle a pointer-enter / touch-start on the button. Returns the new
    /// offset, or `None` while a previous relocation is still animating.
    pub fn trigger<R: Rng + ?Sized>(&mut self, now_ms: f64, rng: &mut R) -> Option<Displacement> {
        self.settle(now_ms);
        if matches!(self.state, EvasionState::Moving { .. }) {
            tracing::trace!(now_ms, "evasion trigger ignored during cooldown");
            return None;
        }
        let d = Displacement::sample(rng, self.cfg.min_distance_px, self.cfg.max_distance_px);
        self.state = EvasionState::Moving { since_ms: now_ms };
        self.relocations += 1;
        tracing::debug!(dx = d.dx, dy = d.dy, "no button evading");
        Some(d)
    }
}

//! Time-bounded eased rotations.
//!
//! A tween adds a fixed delta to an object's rotation over its duration.
//! Each update applies only the increment since the previous update, so a
//! tween composes additively with anything else spinning the same object.

use crate::scene::SectionRegistry;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ease {
    /// Quadratic ease-in-out
    Power2InOut,
}

impl Ease {
    pub fn apply(self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Power2InOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct RotationTween {
    /// Registry index of the object being rotated
    pub target: usize,
    pub delta: [f64; 3],
    pub duration: f64,
    pub ease: Ease,
    elapsed: f64,
    applied: f64,
}

impl RotationTween {
    pub fn new(target: usize, delta: [f64; 3], duration: f64, ease: Ease) -> Self {
        RotationTween {
            target,
            delta,
            duration,
            ease,
            elapsed: 0.0,
            applied: 0.0,
        }
    }

    /// Advances by `dt` seconds and returns the rotation to add this step
    pub fn advance(&mut self, dt: f64) -> [f64; 3] {
        self.elapsed += dt.max(0.0);
        let progress = if self.duration <= 0.0 {
            1.0
        } else {
            self.ease.apply(self.elapsed / self.duration)
        };
        let step = progress - self.applied;
        self.applied = progress;
        self.delta.map(|d| d * step)
    }

    pub fn finished(&self) -> bool {
        self.elapsed >= self.duration
    }
}

/// Runs every active tween against the section registry
#[derive(Debug, Default)]
pub struct TweenEngine {
    active: Vec<RotationTween>,
}

impl TweenEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, tween: RotationTween) {
        self.active.push(tween);
    }

    #[cfg(test)]
    pub fn active(&self) -> &[RotationTween] {
        &self.active
    }

    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        self.active.is_empty()
    }

    /// Steps all tweens and drops the finished ones. A tween whose object
    /// has disappeared is dropped without touching anything else.
    pub fn update(&mut self, dt: f64, registry: &mut SectionRegistry) {
        self.active.retain_mut(|tween| {
            let Some(object) = registry.get_mut(tween.target) else {
                log::debug!("dropping tween for missing section {}", tween.target);
                return false;
            };
            let step = tween.advance(dt);
            for (axis, amount) in step.iter().enumerate() {
                object.transform.rotation[axis] += amount;
            }
            !tween.finished()
        });
    }
}

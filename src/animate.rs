//! Per-frame scene update and the section-change trigger.

use std::time::Duration;

use crate::config::{SECTION_SPACING, SECTION_TWEEN_DELTA, SECTION_TWEEN_DURATION, SPIN_RATE};
use crate::scene::{Scene, SectionRegistry};
use crate::schedule::Clock;
use crate::state::{section_index, InputState};
use crate::tween::{Ease, RotationTween, TweenEngine};

/// Time since the loop started and since the previous tick, in seconds
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameTime {
    pub elapsed: f64,
    pub delta: f64,
}

/// Turns clock readings into frame times; owned by the frame loop
pub struct FrameClock<C: Clock> {
    clock: C,
    start: Duration,
    previous_elapsed: f64,
}

impl<C: Clock> FrameClock<C> {
    pub fn new(clock: C) -> Self {
        let start = clock.now();
        FrameClock {
            clock,
            start,
            previous_elapsed: 0.0,
        }
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    pub fn tick(&mut self) -> FrameTime {
        let elapsed = self.clock.now().saturating_sub(self.start).as_secs_f64();
        let delta = (elapsed - self.previous_elapsed).max(0.0);
        self.previous_elapsed = elapsed;
        FrameTime { elapsed, delta }
    }
}

/// Which registry slots one update touched
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    pub rotated: Vec<usize>,
    pub skipped: Vec<usize>,
}

/// Advances every time-dependent part of the scene by one frame
pub fn update_scene(scene: &mut Scene, input: &InputState, time: FrameTime) -> TickReport {
    scene.rig.camera.position[1] = -input.scroll.offset / input.viewport.height * SECTION_SPACING;
    scene.rig.follow_cursor(&input.cursor, time.delta);

    let report = spin_sections(&mut scene.registry, time.delta);

    if let Some(mixer) = scene.mixer.as_mut() {
        mixer.update(time.delta);
    }
    report
}

/// Continuous rotation of every loaded section object; empty slots are skipped
pub fn spin_sections(registry: &mut SectionRegistry, delta: f64) -> TickReport {
    let mut report = TickReport::default();
    for (index, slot) in registry.slots_mut() {
        match slot {
            Some(object) => {
                object.transform.rotation[0] += delta * SPIN_RATE[0];
                object.transform.rotation[1] += delta * SPIN_RATE[1];
                report.rotated.push(index);
            }
            None => report.skipped.push(index),
        }
    }
    report
}

/// Remembers the section in view and reports when it changes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SectionTrigger {
    current: i64,
}

impl SectionTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> i64 {
        self.current
    }

    /// Returns the newly entered section, if the scroll moved to another one
    pub fn on_scroll(&mut self, offset: f64, viewport_height: f64) -> Option<i64> {
        let section = section_index(offset, viewport_height);
        if section == self.current {
            return None;
        }
        log::debug!("section {} -> {}", self.current, section);
        self.current = section;
        Some(section)
    }
}

/// Starts the entrance spin for a section's object. Returns false, without
/// side effects, when the section has no object yet.
pub fn start_section_tween(
    tweens: &mut TweenEngine,
    registry: &SectionRegistry,
    section: i64,
) -> bool {
    let Some(target) = usize::try_from(section).ok() else {
        return false;
    };
    let Some(object) = registry.get(target) else {
        log::debug!("no object in section {section}, skipping entrance spin");
        return false;
    };
    log::debug!("entrance spin for {} in section {section}", object.name);
    tweens.start(RotationTween::new(
        target,
        SECTION_TWEEN_DELTA,
        SECTION_TWEEN_DURATION,
        Ease::Power2InOut,
    ));
    true
}

//! Application state and event dispatch.

use std::time::Duration;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEvent, MouseEventKind};

use crate::animate::{start_section_tween, update_scene, FrameClock, SectionTrigger};
use crate::config::{SceneSettings, CELL_HEIGHT_PX, CELL_WIDTH_PX, MODEL_SECTION, SCROLL_STEP_PX};
use crate::error::SceneError;
use crate::model::ModelLoader;
use crate::panel::{DebugPanel, PanelStatus, Parameters};
use crate::render::{Renderer, Surface};
use crate::scene::Scene;
use crate::schedule::{Clock, FrameHandle, FrameScheduler};
use crate::state::{Cursor, InputState, ScrollState, Viewport};
use crate::tween::TweenEngine;

/// Whether the run loop should keep going after an event
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Continue,
    Quit,
}

#[derive(Clone, Debug)]
pub struct AppOptions {
    pub testing: bool,
    pub settings: SceneSettings,
    pub fps: u32,
    pub device_pixel_ratio: f64,
}

pub struct App<S: Surface, C: Clock> {
    input: InputState,
    scene: Scene,
    trigger: SectionTrigger,
    tweens: TweenEngine,
    renderer: Renderer<S>,
    frame_clock: FrameClock<C>,
    scheduler: FrameScheduler,
    frame: Option<FrameHandle>,
    loader: Option<ModelLoader>,
    panel: DebugPanel,
    params: Parameters,
    device_pixel_ratio: f64,
}

impl<S: Surface, C: Clock> App<S, C> {
    /// Builds the scene for a terminal of `cols` x `rows` cells
    pub fn new(
        options: AppOptions,
        surface: S,
        clock: C,
        (cols, rows): (u16, u16),
        loader: Option<ModelLoader>,
    ) -> Self {
        let (cols, rows) = (cols.max(1), rows.max(1));
        let viewport = Viewport::new(
            cols as f64 * CELL_WIDTH_PX,
            rows as f64 * CELL_HEIGHT_PX,
            options.device_pixel_ratio,
        );
        let scene = Scene::assemble(&viewport, &options.settings);

        let mut renderer = Renderer::new(surface);
        renderer.set_size(cols as usize, rows as usize * 2, viewport.pixel_ratio);

        let scheduler = FrameScheduler::with_fps(options.fps);
        log::info!("frame interval {:?}", scheduler.interval());

        let mut panel = DebugPanel::new(true);
        if !options.testing {
            panel.hide();
        }

        App {
            input: InputState::new(viewport),
            scene,
            trigger: SectionTrigger::new(),
            tweens: TweenEngine::new(),
            renderer,
            frame_clock: FrameClock::new(clock),
            scheduler,
            frame: None,
            loader,
            panel,
            params: Parameters {
                material_color: options.settings.material_color,
            },
            device_pixel_ratio: options.device_pixel_ratio,
        }
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn frames_rendered(&self) -> u64 {
        self.renderer.frames_rendered()
    }

    #[cfg(test)]
    fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn handle_event(&mut self, event: &Event) -> Control {
        match event {
            Event::Key(key) => return self.on_key(key),
            Event::Mouse(mouse) => self.on_mouse(mouse),
            Event::Resize(cols, rows) => self.on_resize(*cols, *rows),
            _ => {}
        }
        Control::Continue
    }

    fn on_key(&mut self, key: &KeyEvent) -> Control {
        if key.kind != KeyEventKind::Press {
            return Control::Continue;
        }
        let page = self.input.viewport.height;
        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => return Control::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                return Control::Quit
            }
            KeyCode::Char('c') => {
                self.panel
                    .cycle_color(&mut self.params, &mut self.scene.materials);
            }
            KeyCode::Down | KeyCode::Char('j') => self.scroll_by(SCROLL_STEP_PX),
            KeyCode::Up | KeyCode::Char('k') => self.scroll_by(-SCROLL_STEP_PX),
            KeyCode::PageDown | KeyCode::Char(' ') => self.scroll_by(page),
            KeyCode::PageUp => self.scroll_by(-page),
            KeyCode::Home => self.on_scroll(0.0),
            KeyCode::End => self.on_scroll(ScrollState::max_offset(&self.input.viewport)),
            _ => {}
        }
        Control::Continue
    }

    fn on_mouse(&mut self, mouse: &MouseEvent) {
        match mouse.kind {
            MouseEventKind::ScrollDown => self.scroll_by(SCROLL_STEP_PX),
            MouseEventKind::ScrollUp => self.scroll_by(-SCROLL_STEP_PX),
            MouseEventKind::Moved | MouseEventKind::Drag(_) => {
                // Centre of the cell under the pointer
                let x = (mouse.column as f64 + 0.5) * CELL_WIDTH_PX;
                let y = (mouse.row as f64 + 0.5) * CELL_HEIGHT_PX;
                self.on_pointer_move(x, y);
            }
            _ => {}
        }
    }

    pub fn on_resize(&mut self, cols: u16, rows: u16) {
        if cols == 0 || rows == 0 {
            log::warn!("ignoring resize to {cols}x{rows} cells");
            return;
        }
        self.resize_viewport(cols as f64 * CELL_WIDTH_PX, rows as f64 * CELL_HEIGHT_PX);
        self.renderer
            .set_size(cols as usize, rows as usize * 2, self.input.viewport.pixel_ratio);
    }

    /// Updates the viewport record and the camera projection
    pub fn resize_viewport(&mut self, width: f64, height: f64) {
        self.input.resize(width, height, self.device_pixel_ratio);
        let camera = &mut self.scene.rig.camera;
        camera.aspect = self.input.viewport.aspect();
        camera.update_projection_matrix();
        let viewport = &self.input.viewport;
        log::info!(
            "viewport resized to {width}x{height} (pixel ratio {}, mobile {}, tablet {})",
            viewport.pixel_ratio,
            viewport.is_mobile,
            viewport.is_tablet
        );
    }

    fn scroll_by(&mut self, amount: f64) {
        self.on_scroll(self.input.scroll.offset + amount);
    }

    pub fn on_scroll(&mut self, offset: f64) {
        self.input.scroll.scroll_to(offset, &self.input.viewport);
        self.check_section();
    }

    fn check_section(&mut self) {
        let offset = self.input.scroll.offset;
        if let Some(section) = self.trigger.on_scroll(offset, self.input.viewport.height) {
            start_section_tween(&mut self.tweens, &self.scene.registry, section);
        }
    }

    pub fn on_pointer_move(&mut self, client_x: f64, client_y: f64) {
        self.input.cursor = Cursor::from_client(client_x, client_y, &self.input.viewport);
    }

    /// One frame: attach the model if it arrived, advance, render
    pub fn tick(&mut self) -> Result<(), SceneError> {
        if let Some(loader) = self.loader.as_mut() {
            if let Some(model) = loader.poll() {
                self.scene.attach_model(model, &self.input.viewport);
            }
            if !loader.is_pending() {
                self.loader = None;
            }
        }

        let time = self.frame_clock.tick();
        self.tweens.update(time.delta, &mut self.scene.registry);
        let report = update_scene(&mut self.scene, &self.input, time);
        log::trace!("spun sections {:?}, skipped {:?}", report.rotated, report.skipped);

        self.panel.fps.record(self.frame_clock.now());
        let overlay = self.panel.lines(
            &self.params,
            &PanelStatus {
                elapsed: time.elapsed,
                section: self.trigger.current(),
                scroll_offset: self.input.scroll.offset,
                model_loaded: self.scene.registry.get(MODEL_SECTION).is_some(),
            },
        );
        self.renderer.render(&self.scene, &overlay)
    }

    /// Schedules the first frame
    pub fn start(&mut self) {
        let now = self.frame_clock.now();
        self.frame = Some(self.scheduler.request_frame(now));
    }

    /// Cancels the pending frame, if any
    pub fn stop(&mut self) {
        if let Some(handle) = self.frame.take() {
            self.scheduler.cancel(handle);
        }
    }

    pub fn time_until_next_frame(&self) -> Option<Duration> {
        self.scheduler
            .next_due()
            .map(|due| due.saturating_sub(self.frame_clock.now()))
    }

    /// Runs the pending frame if its deadline has passed and schedules the
    /// next one. A failing tick is logged; the loop keeps going.
    pub fn run_frame_if_due(&mut self) -> bool {
        let now = self.frame_clock.now();
        if self.scheduler.take_due(now).is_none() {
            return false;
        }
        if let Err(e) = self.tick() {
            log::warn!("frame failed: {e}");
        }
        let now = self.frame_clock.now();
        self.frame = Some(self.scheduler.request_frame(now));
        true
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use crossterm::event::{KeyEventState, MouseButton};

    use super::*;
    use crate::color::Color;
    use crate::model::tests::sample_model;
    use crate::render::tests::RecordingSurface;
    use crate::schedule::ManualClock;

    const FRAME: Duration = Duration::from_millis(17);

    fn options(testing: bool, device_pixel_ratio: f64) -> AppOptions {
        AppOptions {
            testing,
            settings: SceneSettings {
                material_color: Color::WHITE,
                seed: 7,
            },
            fps: 60,
            device_pixel_ratio,
        }
    }

    /// 150x50 cells is a 1200x800 viewport
    fn app(testing: bool) -> (App<RecordingSurface, ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let app = App::new(
            options(testing, 1.0),
            RecordingSurface::default(),
            clock.clone(),
            (150, 50),
            None,
        );
        (app, clock)
    }

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    #[test]
    fn cells_map_to_logical_pixels() {
        let (app, _) = app(false);
        assert_eq!(app.input().viewport.width, 1200.0);
        assert_eq!(app.input().viewport.height, 800.0);
        assert_eq!(app.renderer.output_size(), (150, 100));
    }

    #[test]
    fn resize_updates_aspect_and_caps_pixel_ratio() {
        let clock = ManualClock::new();
        let mut app = App::new(
            options(false, 3.0),
            RecordingSurface::default(),
            clock,
            (150, 50),
            None,
        );
        app.resize_viewport(1920.0, 1080.0);
        let camera = &app.scene().rig.camera;
        assert!((camera.aspect - 1920.0 / 1080.0).abs() < 1e-12);
        assert!(app.input().viewport.pixel_ratio <= 2.0);

        let before = app.input().clone();
        app.resize_viewport(1920.0, 1080.0);
        assert_eq!(app.input(), &before);
    }

    #[test]
    fn terminal_resize_resizes_the_renderer() {
        let (mut app, _) = app(false);
        app.handle_event(&Event::Resize(80, 24));
        assert_eq!(app.renderer.output_size(), (80, 48));
        assert_eq!(app.input().viewport.width, 640.0);
        assert!(app.input().viewport.is_mobile);

        app.handle_event(&Event::Resize(0, 10));
        assert_eq!(app.renderer.output_size(), (80, 48));
    }

    #[test]
    fn jumping_to_the_end_starts_one_tween() {
        let (mut app, _) = app(false);
        assert_eq!(app.handle_event(&key(KeyCode::End)), Control::Continue);
        assert_eq!(app.input().scroll.offset, 4000.0);
        assert_eq!(app.trigger.current(), 5);
        assert_eq!(app.tweens.active().len(), 1);
        assert_eq!(app.tweens.active()[0].target, 5);
    }

    #[test]
    fn resizing_does_not_start_a_section_spin() {
        let (mut fresh, _) = app(false);
        fresh.resize_viewport(640.0, 300.0);
        assert_eq!(fresh.trigger.current(), 0);
        assert!(fresh.tweens.is_idle());

        let (mut scrolled, _) = app(false);
        scrolled.on_scroll(1000.0);
        assert_eq!(scrolled.trigger.current(), 1);
        assert_eq!(scrolled.tweens.active().len(), 1);

        // 1000px of a 400px page would round to section 3
        scrolled.resize_viewport(1200.0, 400.0);
        assert_eq!(scrolled.input().scroll.offset, 1000.0);
        assert_eq!(scrolled.trigger.current(), 1);
        assert_eq!(scrolled.tweens.active().len(), 1);
    }

    #[test]
    fn scrolling_into_the_empty_model_section_starts_nothing() {
        let (mut app, _) = app(false);
        app.on_scroll(1600.0);
        assert_eq!(app.trigger.current(), MODEL_SECTION as i64);
        assert!(app.tweens.is_idle());
    }

    #[test]
    fn wheel_scrolls_and_clamps() {
        let (mut app, _) = app(false);
        let wheel = |kind| {
            Event::Mouse(MouseEvent {
                kind,
                column: 0,
                row: 0,
                modifiers: KeyModifiers::NONE,
            })
        };
        app.handle_event(&wheel(MouseEventKind::ScrollDown));
        assert_eq!(app.input().scroll.offset, SCROLL_STEP_PX);
        app.handle_event(&wheel(MouseEventKind::ScrollUp));
        app.handle_event(&wheel(MouseEventKind::ScrollUp));
        assert_eq!(app.input().scroll.offset, 0.0);
    }

    #[test]
    fn pointer_motion_sets_the_cursor() {
        let (mut app, _) = app(false);
        app.handle_event(&Event::Mouse(MouseEvent {
            kind: MouseEventKind::Drag(MouseButton::Left),
            column: 149,
            row: 0,
            modifiers: KeyModifiers::NONE,
        }));
        let cursor = app.input().cursor;
        assert!((cursor.x - (1196.0 / 1200.0 - 0.5)).abs() < 1e-12);
        assert!((cursor.y - (8.0 / 800.0 - 0.5)).abs() < 1e-12);
    }

    #[test]
    fn quit_keys() {
        let (mut app, _) = app(false);
        assert_eq!(app.handle_event(&key(KeyCode::Char('q'))), Control::Quit);
        assert_eq!(app.handle_event(&key(KeyCode::Esc)), Control::Quit);
        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert_eq!(app.handle_event(&ctrl_c), Control::Quit);
    }

    #[test]
    fn colour_key_only_works_in_testing_mode() {
        let (mut hidden, _) = app(false);
        hidden.handle_event(&key(KeyCode::Char('c')));
        assert_eq!(hidden.scene().materials.toon.color, Color::WHITE);

        let (mut testing, _) = app(true);
        testing.handle_event(&key(KeyCode::Char('c')));
        assert_ne!(testing.scene().materials.toon.color, Color::WHITE);
        assert_eq!(testing.params.material_color, testing.scene().materials.glass.color);
    }

    #[test]
    fn frames_run_on_schedule() {
        let (mut app, clock) = app(false);
        assert!(!app.run_frame_if_due());

        app.start();
        assert!(app.run_frame_if_due());
        assert!(!app.run_frame_if_due());
        assert_eq!(app.renderer.surface().presented, 1);

        clock.advance(FRAME);
        assert!(app.run_frame_if_due());
        assert_eq!(app.renderer.surface().presented, 2);

        app.stop();
        clock.advance(FRAME);
        assert!(!app.run_frame_if_due());
        assert_eq!(app.time_until_next_frame(), None);
    }

    #[test]
    fn failing_surface_keeps_the_loop_alive() {
        let (mut app, clock) = app(false);
        app.renderer.surface_mut().fail_next = 1;
        app.start();

        assert!(app.run_frame_if_due());
        assert_eq!(app.renderer.surface().presented, 0);

        clock.advance(FRAME);
        assert!(app.run_frame_if_due());
        assert_eq!(app.renderer.surface().presented, 1);
    }

    #[test]
    fn model_is_attached_when_it_arrives() {
        let (sender, receiver) = mpsc::channel();
        let clock = ManualClock::new();
        let mut app = App::new(
            options(false, 1.0),
            RecordingSurface::default(),
            clock.clone(),
            (150, 50),
            Some(ModelLoader::from_receiver(receiver)),
        );
        app.start();
        assert!(app.run_frame_if_due());
        assert!(app.scene().registry.get(MODEL_SECTION).is_none());

        sender.send(Ok(sample_model())).unwrap();
        clock.advance(FRAME);
        assert!(app.run_frame_if_due());
        assert!(app.scene().registry.get(MODEL_SECTION).is_some());
        assert!(app.scene().mixer.is_some());
        assert!(app.loader.is_none());
    }

    #[test]
    fn overlay_is_shown_only_when_testing() {
        let (mut testing, _) = app(true);
        testing.start();
        testing.run_frame_if_due();
        assert!(!testing.renderer.surface().last_overlay.is_empty());

        let (mut quiet, _) = app(false);
        quiet.start();
        quiet.run_frame_if_due();
        assert!(quiet.renderer.surface().last_overlay.is_empty());
    }
}

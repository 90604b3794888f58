//! Winit frame driver: wires the renderer, pointer tracker, editor surface,
//! and sketch store into a single-threaded event loop.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Receiver};
use renderer::{FrameState, PointerTracker, Renderer, RendererConfig, RendererEvent};
use sketchbook::SketchStore;
use tracing::{debug, error, info, warn};
use winit::dpi::LogicalSize;
use winit::event::{ElementState, Event, MouseButton, TouchPhase, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop, EventLoopWindowTarget};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::cli::Cli;
use crate::config::{AppPaths, Config, Settings};
use crate::editor::{Debouncer, EditorSurface};

/// Starting source when no file or stored sketch provides one; also seeds
/// newly named sketches.
const DEFAULT_FRAGMENT: &str = r"void main() {
    vec2 uv = gl_FragCoord.xy / resolution;
    vec2 focus = pointerCount > 0 ? touch / resolution : vec2(0.5);
    float glow = 0.03 / max(distance(uv, focus), 0.03);
    vec3 color = 0.5 + 0.5 * cos(time + uv.xyx * 6.2831 + vec3(0.0, 2.0, 4.0));
    O = vec4(color * (0.25 + glow), 1.0);
}
";

/// Pointer identity used for the mouse; touch ids are offset past it.
const MOUSE_ID: u64 = 0;

/// How often a watched source file is stat'ed for edits.
const WATCH_INTERVAL: Duration = Duration::from_millis(250);

pub fn run(cli: Cli) -> Result<()> {
    let paths = AppPaths::discover()?;
    let mut config = Config::load_or_default(&paths.config_file);
    let settings = Settings::resolve(&cli, &config);
    let namespace = config.ensure_namespace(&paths.config_file);

    let store = SketchStore::open(&paths.sketch_dir, namespace);
    let mut keep = config.keep.clone();
    if let Some(name) = &cli.sketch {
        keep.push(name.clone());
    }
    store.cleanup(&keep);

    let (source, watch) = initial_source(&cli, &store)?;
    let watched = watch
        .as_ref()
        .map(|watch| watch.path.display().to_string())
        .unwrap_or_else(|| "<none>".to_owned());
    info!(
        sketch = cli.sketch.as_deref().unwrap_or("<none>"),
        file = %watched,
        "starting"
    );

    let event_loop = EventLoop::new().context("creating event loop")?;
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("fragpad")
            .with_inner_size(LogicalSize::new(
                settings.window_size.0,
                settings.window_size.1,
            ))
            .build(&event_loop)
            .context("creating window")?,
    );

    let (events_tx, events_rx) = unbounded();
    let inner = window.inner_size();
    let renderer = Renderer::new(
        &*window,
        RendererConfig {
            surface_size: (inner.width, inner.height),
            fragment_source: source.clone(),
            render_scale: settings.render_scale,
        },
        events_tx,
    )
    .context("initialising renderer")?;

    let mut app = App {
        window,
        renderer,
        tracker: PointerTracker::new(),
        editor: EditorSurface::new(source),
        debouncer: Debouncer::new(settings.debounce),
        store,
        sketch: cli.sketch.clone(),
        watch,
        events: events_rx,
        render_scale: settings.render_scale,
        frame_interval: settings.fps_cap.map(|fps| Duration::from_secs(1) / fps.max(1)),
        next_frame: Instant::now(),
        started: Instant::now(),
        cursor: (0.0, 0.0),
    };
    app.sync_viewport();
    app.pump_renderer_events();

    event_loop
        .run(move |event, elwt| match event {
            Event::WindowEvent { event, .. } => app.window_event(event, elwt),
            Event::AboutToWait => app.about_to_wait(elwt),
            _ => {}
        })
        .context("event loop failed")
}

/// Polls one source file's mtime; the desktop stand-in for textarea edits.
struct SourceWatch {
    path: PathBuf,
    mtime: Option<SystemTime>,
    next_poll: Instant,
}

impl SourceWatch {
    fn new(path: PathBuf) -> Self {
        let mtime = fs::metadata(&path).and_then(|meta| meta.modified()).ok();
        Self {
            path,
            mtime,
            next_poll: Instant::now() + WATCH_INTERVAL,
        }
    }

    /// Returns the new contents when the file changed since the last poll.
    fn poll(&mut self, now: Instant) -> Option<String> {
        if now < self.next_poll {
            return None;
        }
        self.next_poll = now + WATCH_INTERVAL;

        let mtime = match fs::metadata(&self.path).and_then(|meta| meta.modified()) {
            Ok(mtime) => mtime,
            Err(err) => {
                debug!(path = %self.path.display(), %err, "source file unreadable; keeping current program");
                return None;
            }
        };
        if self.mtime == Some(mtime) {
            return None;
        }
        self.mtime = Some(mtime);
        match fs::read_to_string(&self.path) {
            Ok(contents) => Some(contents),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "failed to read edited source");
                None
            }
        }
    }
}

fn initial_source(cli: &Cli, store: &SketchStore) -> Result<(String, Option<SourceWatch>)> {
    if let Some(path) = &cli.file {
        let source = fs::read_to_string(path)
            .with_context(|| format!("reading shader file {}", path.display()))?;
        return Ok((source, Some(SourceWatch::new(path.clone()))));
    }
    if let Some(name) = &cli.sketch {
        // Edits arrive through the sketch's backing file, so a missing
        // sketch is materialised up front to give the user a file to edit.
        let source = match store.get(name) {
            Some(source) => source,
            None => {
                info!(name, "sketch not found; seeding it with the default shader");
                store.put(name, DEFAULT_FRAGMENT);
                DEFAULT_FRAGMENT.to_owned()
            }
        };
        let watch = store.path(name).map(SourceWatch::new);
        return Ok((source, watch));
    }
    Ok((DEFAULT_FRAGMENT.to_owned(), None))
}

struct App {
    window: Arc<Window>,
    renderer: Renderer,
    tracker: PointerTracker,
    editor: EditorSurface,
    debouncer: Debouncer,
    store: SketchStore,
    sketch: Option<String>,
    watch: Option<SourceWatch>,
    events: Receiver<RendererEvent>,
    render_scale: f32,
    frame_interval: Option<Duration>,
    next_frame: Instant,
    started: Instant,
    cursor: (f64, f64),
}

impl App {
    fn window_event(&mut self, event: WindowEvent, elwt: &EventLoopWindowTarget<()>) {
        match event {
            WindowEvent::CloseRequested => elwt.exit(),
            WindowEvent::Resized(size) => {
                self.renderer.resize(size);
                self.sync_viewport();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    self.key_pressed(event.logical_key, elwt);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x, position.y);
                self.tracker.motion(MOUSE_ID, position.x, position.y);
            }
            WindowEvent::MouseInput { state, button, .. } => {
                if button == MouseButton::Left {
                    match state {
                        ElementState::Pressed => {
                            self.tracker.press(MOUSE_ID, self.cursor.0, self.cursor.1)
                        }
                        ElementState::Released => self.tracker.release(MOUSE_ID),
                    }
                }
            }
            WindowEvent::CursorLeft { .. } => self.tracker.leave(MOUSE_ID),
            WindowEvent::Touch(touch) => {
                let id = touch.id + 1;
                let (x, y) = (touch.location.x, touch.location.y);
                match touch.phase {
                    TouchPhase::Started => self.tracker.press(id, x, y),
                    TouchPhase::Moved => self.tracker.motion(id, x, y),
                    TouchPhase::Ended => self.tracker.release(id),
                    TouchPhase::Cancelled => self.tracker.cancel(id),
                }
            }
            WindowEvent::RedrawRequested => self.redraw(elwt),
            _ => {}
        }
    }

    fn key_pressed(&mut self, key: Key, elwt: &EventLoopWindowTarget<()>) {
        match key {
            Key::Named(NamedKey::Escape) => elwt.exit(),
            Key::Named(NamedKey::F1) => {
                self.editor.toggle_hidden();
                info!(hidden = self.editor.hidden(), "editor visibility toggled");
            }
            Key::Named(NamedKey::F2) => {
                self.render_scale = if self.render_scale < 1.0 { 1.0 } else { 0.5 };
                self.renderer.rescale(self.render_scale);
                self.sync_viewport();
                info!(scale = self.render_scale, "render scale toggled");
            }
            Key::Named(NamedKey::F5) => {
                let source = self.editor.reset();
                info!("resetting to the originally loaded source");
                self.apply_candidate(source);
            }
            _ => {}
        }
    }

    /// Keeps the pointer tracker's coordinate mapping in step with the
    /// drawable after any resize or rescale.
    fn sync_viewport(&mut self) {
        let (_, height) = self.renderer.drawable_size();
        self.tracker
            .set_viewport(height as f64, self.render_scale as f64);
    }

    fn about_to_wait(&mut self, elwt: &EventLoopWindowTarget<()>) {
        let now = Instant::now();
        self.pump_renderer_events();

        if let Some(watch) = &mut self.watch {
            if let Some(contents) = watch.poll(now) {
                // Our own persistence writes bump the mtime too; only a real
                // text change counts as an edit.
                if contents != self.editor.text() {
                    self.editor.set_text(contents);
                    self.debouncer.note_edit(now);
                }
            }
        }

        if self.debouncer.take(now) {
            let candidate = self.editor.text().to_owned();
            self.apply_candidate(candidate);
        }

        match self.frame_interval {
            Some(interval) => {
                if now >= self.next_frame {
                    self.next_frame = now + interval;
                    self.window.request_redraw();
                }
                let mut wake = self.next_frame.min(now + WATCH_INTERVAL);
                if let Some(deadline) = self.debouncer.next_deadline() {
                    wake = wake.min(deadline);
                }
                elwt.set_control_flow(ControlFlow::WaitUntil(wake));
            }
            None => {
                self.window.request_redraw();
                elwt.set_control_flow(ControlFlow::Poll);
            }
        }
    }

    /// Tests the candidate and swaps it in on success; failures land in the
    /// editor without touching the live program.
    fn apply_candidate(&mut self, candidate: String) {
        match self.renderer.test(&candidate) {
            Some(diagnostic) => {
                warn!(line = diagnostic.line(), "candidate rejected");
                self.editor.set_error(&diagnostic);
            }
            None => {
                self.renderer.swap(&candidate);
                if self.renderer.phase() == renderer::ProgramPhase::Linked {
                    self.editor.clear_error();
                    if let Some(name) = &self.sketch {
                        self.store.put(name, &candidate);
                    }
                }
            }
        }
        self.pump_renderer_events();
    }

    fn pump_renderer_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            match event {
                RendererEvent::Compile(diagnostic) => {
                    warn!(stage = %diagnostic.stage(), line = diagnostic.line(), "compile failed");
                    self.editor.set_error(&diagnostic);
                }
                RendererEvent::Link(message) => {
                    warn!(%message, "program link failed");
                    self.editor.set_error_text(message);
                }
            }
        }
    }

    fn redraw(&mut self, elwt: &EventLoopWindowTarget<()>) {
        let (width, height) = self.renderer.drawable_size();
        let frame = FrameState::from_snapshot(
            self.tracker.snapshot(),
            [width as f32, height as f32],
        );
        self.renderer.feed_frame(frame);

        let timestamp_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        match self.renderer.draw(timestamp_ms) {
            Ok(()) => {}
            Err(renderer::SurfaceError::Lost | renderer::SurfaceError::Outdated) => {
                debug!("surface lost; reconfiguring");
                self.renderer.resize(self.window.inner_size());
            }
            Err(renderer::SurfaceError::OutOfMemory) => {
                error!("surface out of memory");
                elwt.exit();
            }
            Err(err) => warn!(%err, "frame skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn sketch_mode_watches_the_backing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SketchStore::open(dir.path(), "ns1");
        store.put("plasma", "void main(){O=vec4(1.0);}");
        let cli = Cli::parse_from(["fragpad", "plasma"]);

        let (source, watch) = initial_source(&cli, &store).unwrap();
        assert_eq!(source, "void main(){O=vec4(1.0);}");
        let mut watch = watch.expect("sketch edits arrive through the backing file");
        assert_eq!(watch.path, store.path("plasma").unwrap());

        // An on-disk edit of the stored sketch flows through the watch.
        store.put("plasma", "void main(){O=vec4(0.0);}");
        let bumped = SystemTime::now() + Duration::from_secs(2);
        let file = fs::File::options().write(true).open(&watch.path).unwrap();
        file.set_modified(bumped).unwrap();
        assert_eq!(
            watch.poll(Instant::now() + 2 * WATCH_INTERVAL).as_deref(),
            Some("void main(){O=vec4(0.0);}")
        );
    }

    #[test]
    fn missing_sketch_is_seeded_and_watched() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = SketchStore::open(dir.path(), "ns1");
        let cli = Cli::parse_from(["fragpad", "fresh"]);

        let (source, watch) = initial_source(&cli, &store).unwrap();
        assert_eq!(source, DEFAULT_FRAGMENT);
        assert!(watch.is_some());
        assert_eq!(store.get("fresh").as_deref(), Some(DEFAULT_FRAGMENT));
    }

    #[test]
    fn default_fragment_validates() {
        assert!(renderer::validate_fragment(DEFAULT_FRAGMENT).is_none());
    }

    #[test]
    fn watch_reports_content_once_per_change() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("sketch.glsl");
        fs::write(&path, "v1").unwrap();
        let mut watch = SourceWatch::new(path.clone());

        let later = Instant::now() + 2 * WATCH_INTERVAL;
        assert_eq!(watch.poll(later), None);

        fs::write(&path, "v2").unwrap();
        // Force a different mtime even on coarse-grained filesystems.
        let bumped = SystemTime::now() + Duration::from_secs(2);
        let file = fs::File::options().write(true).open(&path).unwrap();
        file.set_modified(bumped).unwrap();

        let after = later + 2 * WATCH_INTERVAL;
        assert_eq!(watch.poll(after).as_deref(), Some("v2"));
        assert_eq!(watch.poll(after + 2 * WATCH_INTERVAL), None);
    }

    #[test]
    fn missing_watched_file_is_quiet() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut watch = SourceWatch::new(dir.path().join("gone.glsl"));
        assert_eq!(watch.poll(Instant::now() + 2 * WATCH_INTERVAL), None);
    }
}

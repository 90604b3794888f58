//! Renderer crate for Fragpad.
//!
//! Glues GLSL front-end validation, the `wgpu` pipeline, and per-frame input
//! feeding together. The overall flow is:
//!
//! ```text
//!   fragpad (frame driver)
//!        │ test(candidate) ──▶ naga front-end ──▶ diagnostic | None
//!        │ swap(source)    ──▶ drop live ──▶ relink ──▶ Linked | Failed
//!        │ feed_frame(FrameState)
//!        └ draw(timestamp_ms) ──▶ uniforms ──▶ fullscreen quad
//! ```
//!
//! [`Renderer`] owns all GPU resources behind a narrow interface; there is no
//! ambient singleton. The host constructs one and threads it through its
//! event loop. Diagnostics outside the `test` return channel travel over the
//! `crossbeam-channel` sender registered at construction.

mod compile;
mod diagnostics;
mod gpu;
mod pointer;

use crossbeam_channel::Sender;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use thiserror::Error;
use tracing::{info, warn};
use winit::dpi::PhysicalSize;

pub use compile::{validate_fragment, MAX_POINTERS};
pub use diagnostics::{extract_error_line, CompileDiagnostic, RendererEvent, StageKind};
pub use pointer::{PointerSnapshot, PointerTracker};
pub use wgpu::SurfaceError;

use gpu::GpuState;

/// Fatal renderer errors. Shader-level problems are diagnostics, not errors.
#[derive(Debug, Error)]
pub enum RendererError {
    /// No usable GPU context; the renderer cannot initialise at all.
    #[error("GPU context unavailable: {0}")]
    ContextUnavailable(String),
}

/// Program lifecycle phase. `Failed` skips drawing without crashing the
/// frame loop; there is no implicit fallback shader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramPhase {
    Uninitialized,
    Compiling,
    Linked,
    Failed,
}

/// Inputs recomputed every frame by the driver and fed before `draw`.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameState {
    /// Drawable size in device pixels.
    pub resolution: [f32; 2],
    /// Number of active pointers.
    pub pointer_count: u32,
    /// Flattened (x, y) pairs, one per active pointer.
    pub coords: Vec<f32>,
    /// Primary pointer coordinate (earliest active, or retained fallback).
    pub primary: [f32; 2],
    /// Accumulated movement delta.
    pub movement: [f32; 2],
}

impl FrameState {
    /// Assembles a frame from a pointer snapshot and the drawable size.
    pub fn from_snapshot(snapshot: PointerSnapshot, resolution: [f32; 2]) -> Self {
        Self {
            resolution,
            pointer_count: snapshot.count,
            coords: snapshot.coords,
            primary: snapshot.primary,
            movement: snapshot.movement,
        }
    }
}

/// Immutable configuration passed to the renderer at start-up.
pub struct RendererConfig {
    /// Initial drawable size in device pixels.
    pub surface_size: (u32, u32),
    /// Initial fragment source to compile during setup.
    pub fragment_source: String,
    /// Resolution scale applied to the drawable (1.0 or 0.5 from the UI).
    pub render_scale: f32,
}

/// Owns the GPU program lifecycle, the uniform feed, and the draw call.
pub struct Renderer {
    gpu: GpuState,
    events: Sender<RendererEvent>,
}

impl Renderer {
    /// Setup: acquires the GPU context (fatal on failure), compiles the
    /// fixed vertex stage, then validates and installs the initial fragment
    /// source. Per-stage compile failures do not abort construction: the
    /// renderer comes up with no live program and the diagnostic is emitted
    /// on the event channel, scoped to the failing stage.
    pub fn new<T>(
        target: &T,
        config: RendererConfig,
        events: Sender<RendererEvent>,
    ) -> Result<Self, RendererError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let size = PhysicalSize::new(config.surface_size.0, config.surface_size.1);
        let mut gpu = GpuState::new(target, size)?;
        gpu.rescale(config.render_scale);

        let mut renderer = Self { gpu, events };

        if let Some(diagnostic) = compile::validate_vertex() {
            // The vertex stage is a private constant; reaching this means the
            // build itself is broken, but the contract is still soft-fail.
            warn!(stage = %diagnostic.stage(), "built-in vertex stage failed validation");
            renderer.gpu.mark_failed();
            renderer.emit(RendererEvent::Compile(diagnostic));
            return Ok(renderer);
        }

        let initial = config.fragment_source;
        match renderer.test(&initial) {
            Some(diagnostic) => {
                warn!(line = diagnostic.line(), "initial fragment source rejected");
                renderer.gpu.mark_failed();
                renderer.emit(RendererEvent::Compile(diagnostic));
            }
            None => renderer.swap(&initial),
        }
        Ok(renderer)
    }

    /// Compiles `candidate` as a throwaway fragment stage without touching
    /// the live program. Returns the diagnostic on failure, `None` on
    /// success. Side-effect-free: repeated calls never change what `draw`
    /// renders.
    pub fn test(&self, candidate: &str) -> Option<CompileDiagnostic> {
        compile::validate_fragment(candidate)
    }

    /// Replaces the live program with `source`. Call only after [`test`]
    /// returned `None` for the same source.
    ///
    /// The current program and everything bound uniquely to it are released
    /// first; if relinking fails regardless (the link-failure analogue), the
    /// renderer is left with no live program, a [`RendererEvent::Link`] event
    /// is emitted, and subsequent draws are no-ops until the next successful
    /// swap.
    ///
    /// [`test`]: Renderer::test
    pub fn swap(&mut self, source: &str) {
        let wrapped = compile::wrap_fragment(source);
        match self.gpu.install(&wrapped) {
            Ok(()) => info!("fragment program swapped"),
            Err(message) => {
                warn!(%message, "swap failed after stage compile; no live program");
                self.emit(RendererEvent::Link(message));
            }
        }
    }

    /// Records the latest pointer/movement/resolution inputs for the next
    /// draw; does not draw.
    pub fn feed_frame(&mut self, frame: FrameState) {
        self.gpu.feed_frame(&frame);
    }

    /// Draws one frame at `timestamp_ms` (uniform `time` is seconds). A
    /// no-op `Ok` while no program is live. Surface errors are returned for
    /// the frame driver to handle.
    pub fn draw(&mut self, timestamp_ms: f64) -> Result<(), wgpu::SurfaceError> {
        self.gpu.draw(timestamp_ms)
    }

    /// Immediate viewport update to window size x scale; no recompile.
    pub fn rescale(&mut self, scale: f32) {
        self.gpu.rescale(scale);
    }

    /// Immediate surface reconfigure on a window resize; never debounced.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.gpu.resize(new_size);
    }

    pub fn phase(&self) -> ProgramPhase {
        self.gpu.phase()
    }

    /// Current drawable size in device pixels (after scaling).
    pub fn drawable_size(&self) -> (u32, u32) {
        let size = self.gpu.size();
        (size.width, size.height)
    }

    fn emit(&self, event: RendererEvent) {
        if self.events.send(event).is_err() {
            warn!("renderer event receiver dropped; diagnostic discarded");
        }
    }
}

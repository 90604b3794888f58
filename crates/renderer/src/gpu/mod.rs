//! GPU program lifecycle and per-frame draw.
//!
//! - `context`: instance/surface/device acquisition; the only fatal path.
//! - `pipeline`: the fixed vertex quad plus one linked program generation.
//! - `uniforms`: the std140 bundle mirroring the fragment prelude.
//! - `state`: compile/link/teardown state machine and the draw call.

mod context;
mod pipeline;
mod uniforms;
mod state;

pub(crate) use state::GpuState;

use std::time::{Duration, Instant};

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::debug;
use winit::dpi::PhysicalSize;

use crate::{FrameState, ProgramPhase, RendererError};

use super::context::GpuContext;
use super::pipeline::{PipelineLayouts, ShaderPipeline};
use super::uniforms::PadUniforms;

/// Owns the GPU program lifecycle and the per-frame draw.
///
/// At most one [`ShaderPipeline`] is ever live. A swap drops the current
/// generation before the replacement is linked; if linking fails the state
/// stays in [`ProgramPhase::Failed`] and `draw` becomes a no-op until the
/// next successful install.
pub(crate) struct GpuState {
    context: GpuContext,
    layouts: PipelineLayouts,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniforms: PadUniforms,
    live: Option<ShaderPipeline>,
    phase: ProgramPhase,
    window_size: PhysicalSize<u32>,
    render_scale: f32,
    last_fps_update: Instant,
    frames_since_last_update: u32,
}

impl GpuState {
    pub(crate) fn new<T>(target: &T, initial_size: PhysicalSize<u32>) -> Result<Self, RendererError>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, initial_size)?;
        let layouts = PipelineLayouts::new(&context.device);

        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pad uniform buffer"),
            size: std::mem::size_of::<PadUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("pad uniform bind group"),
                layout: &layouts.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        let uniforms = PadUniforms::new(context.size.width, context.size.height);

        Ok(Self {
            window_size: context.size,
            context,
            layouts,
            uniform_buffer,
            uniform_bind_group,
            uniforms,
            live: None,
            phase: ProgramPhase::Uninitialized,
            render_scale: 1.0,
            last_fps_update: Instant::now(),
            frames_since_last_update: 0,
        })
    }

    pub(crate) fn phase(&self) -> ProgramPhase {
        self.phase
    }

    /// Marks setup-time compile failure; there is no pipeline to tear down.
    pub(crate) fn mark_failed(&mut self) {
        self.phase = ProgramPhase::Failed;
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    /// Tears down the current program and links a replacement from an
    /// already-wrapped fragment source.
    ///
    /// The old pipeline is dropped before the new one is built, so no two
    /// program generations ever coexist. Link-level failures (the candidate
    /// compiled per-stage but the device rejected the pipeline) surface as
    /// the returned diagnostic and leave no live program behind.
    pub(crate) fn install(&mut self, wrapped_source: &str) -> Result<(), String> {
        self.live = None;
        self.phase = ProgramPhase::Compiling;

        self.context
            .device
            .push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = ShaderPipeline::new(
            &self.context.device,
            &self.layouts,
            self.context.surface_format,
            wrapped_source,
        );
        let error = pollster::block_on(self.context.device.pop_error_scope());

        match error {
            Some(error) => {
                self.phase = ProgramPhase::Failed;
                Err(error.to_string())
            }
            None => {
                self.live = Some(pipeline);
                self.phase = ProgramPhase::Linked;
                Ok(())
            }
        }
    }

    pub(crate) fn feed_frame(&mut self, frame: &FrameState) {
        self.uniforms.apply_frame(frame);
    }

    /// Immediate surface reconfigure at the window's new device-pixel size.
    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.window_size = new_size;
        self.apply_scale();
    }

    /// Updates the drawable to window size x scale without recompiling.
    pub(crate) fn rescale(&mut self, scale: f32) {
        self.render_scale = scale.clamp(0.1, 1.0);
        self.apply_scale();
    }

    fn apply_scale(&mut self) {
        let scaled = PhysicalSize::new(
            ((self.window_size.width as f32 * self.render_scale) as u32).max(1),
            ((self.window_size.height as f32 * self.render_scale) as u32).max(1),
        );
        self.context.resize(scaled);
        self.uniforms
            .set_resolution(scaled.width as f32, scaled.height as f32);
    }

    /// Clears, binds the live program, uploads uniforms, and draws the quad.
    /// A no-op while no program is live.
    pub(crate) fn draw(&mut self, timestamp_ms: f64) -> Result<(), wgpu::SurfaceError> {
        let Some(live) = self.live.as_ref() else {
            return Ok(());
        };

        let frame = self.context.surface.get_current_texture()?;

        let now = Instant::now();
        self.frames_since_last_update += 1;
        let elapsed = now.saturating_duration_since(self.last_fps_update);
        if elapsed >= Duration::from_secs(1) {
            debug!(
                fps = (self.frames_since_last_update as f32 / elapsed.as_secs_f32()).round(),
                time_s = (timestamp_ms / 1000.0) as f32,
                "render stats"
            );
            self.frames_since_last_update = 0;
            self.last_fps_update = now;
        }

        self.uniforms.set_time((timestamp_ms / 1000.0) as f32);
        self.context.queue.write_buffer(
            &self.uniform_buffer,
            0,
            bytemuck::bytes_of(&self.uniforms),
        );

        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("pad encoder"),
                });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("pad pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&live.pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.draw(0..4, 0..1);
        }

        self.context.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

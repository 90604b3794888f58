use bytemuck::{Pod, Zeroable};

use crate::compile::MAX_POINTERS;
use crate::FrameState;

/// Fixed-shape uniform bundle uploaded once per draw.
///
/// Field order and padding must match the `PadInputs` std140 block declared
/// by the fragment prelude in `compile.rs`. std140 gives `vec2[]` elements a
/// 16-byte stride, hence the `[f32; 4]` rows with two trailing pad floats.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub(crate) struct PadUniforms {
    resolution: [f32; 2],
    time: f32,
    pointer_count: i32,
    movement: [f32; 2],
    touch: [f32; 2],
    pointers: [[f32; 4]; MAX_POINTERS],
}

unsafe impl Zeroable for PadUniforms {}
unsafe impl Pod for PadUniforms {}

impl PadUniforms {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            resolution: [width as f32, height as f32],
            time: 0.0,
            pointer_count: 0,
            movement: [0.0, 0.0],
            touch: [0.0, 0.0],
            pointers: [[0.0; 4]; MAX_POINTERS],
        }
    }

    pub fn set_resolution(&mut self, width: f32, height: f32) {
        self.resolution = [width, height];
    }

    pub fn set_time(&mut self, seconds: f32) {
        self.time = seconds;
    }

    /// Copies the last fed frame state into the bundle. Pointers beyond the
    /// uniform array capacity are dropped, not wrapped.
    pub fn apply_frame(&mut self, frame: &FrameState) {
        self.pointer_count = frame.pointer_count.min(MAX_POINTERS as u32) as i32;
        self.movement = frame.movement;
        self.touch = frame.primary;
        for (slot, pair) in self
            .pointers
            .iter_mut()
            .zip(frame.coords.chunks_exact(2))
            .take(self.pointer_count.max(1) as usize)
        {
            *slot = [pair[0], pair[1], 0.0, 0.0];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_std140_block_size() {
        // vec2 + float + int + vec2 + vec2 (32 bytes) then vec2[10] at
        // 16-byte stride (160 bytes).
        assert_eq!(std::mem::size_of::<PadUniforms>(), 192);
        assert_eq!(std::mem::align_of::<PadUniforms>(), 16);
    }

    #[test]
    fn frame_state_lands_in_slots() {
        let mut uniforms = PadUniforms::new(640, 480);
        let frame = FrameState {
            resolution: [640.0, 480.0],
            pointer_count: 2,
            coords: vec![10.0, 20.0, 30.0, 40.0],
            primary: [10.0, 20.0],
            movement: [5.0, -3.0],
        };
        uniforms.apply_frame(&frame);
        assert_eq!(uniforms.pointer_count, 2);
        assert_eq!(uniforms.touch, [10.0, 20.0]);
        assert_eq!(uniforms.movement, [5.0, -3.0]);
        assert_eq!(uniforms.pointers[0], [10.0, 20.0, 0.0, 0.0]);
        assert_eq!(uniforms.pointers[1], [30.0, 40.0, 0.0, 0.0]);
    }

    #[test]
    fn pointer_overflow_is_clamped() {
        let mut uniforms = PadUniforms::new(100, 100);
        let count = MAX_POINTERS as u32 + 4;
        let coords: Vec<f32> = (0..count * 2).map(|value| value as f32).collect();
        let frame = FrameState {
            resolution: [100.0, 100.0],
            pointer_count: count,
            coords,
            primary: [0.0, 1.0],
            movement: [0.0, 0.0],
        };
        uniforms.apply_frame(&frame);
        assert_eq!(uniforms.pointer_count, MAX_POINTERS as i32);
    }
}

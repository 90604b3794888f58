//! Pointer tracking in canvas pixel space.
//!
//! Tracks active pointer/touch identities and last-known positions in
//! device-pixel coordinates with the origin at the bottom-left, matching
//! shader-space convention. Movement accumulates until an explicit reset;
//! the consumer decides when (if ever) to clear it.

/// Snapshot of the pointer set taken once per frame by the frame driver.
#[derive(Debug, Clone, PartialEq)]
pub struct PointerSnapshot {
    /// Number of active pointers.
    pub count: u32,
    /// Flattened (x, y) pairs for all active pointers; a single sentinel
    /// `[0.0, 0.0]` when the set is empty.
    pub coords: Vec<f32>,
    /// Earliest-registered active pointer, or the retained fallback.
    pub primary: [f32; 2],
    /// Accumulated movement delta since the last reset.
    pub movement: [f32; 2],
}

#[derive(Debug, Clone, Copy)]
struct TrackedPointer {
    id: u64,
    position: [f32; 2],
}

/// Maps raw window coordinates into canvas pixel space and maintains the
/// pointer set. Identities are added on press, updated on move only while
/// active, and removed on release/cancel/leave; the last pointer's final
/// position survives removal as the single-pointer fallback.
#[derive(Debug)]
pub struct PointerTracker {
    scale: f64,
    height: f64,
    pointers: Vec<TrackedPointer>,
    fallback: [f32; 2],
    movement: [f32; 2],
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self {
            scale: 1.0,
            height: 1.0,
            pointers: Vec::new(),
            fallback: [0.0, 0.0],
            movement: [0.0, 0.0],
        }
    }
}

impl PointerTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Updates the canvas extent (device pixels) and the scale applied to
    /// incoming window coordinates. Called on resize and rescale; positions
    /// already tracked are left as-is.
    pub fn set_viewport(&mut self, height_px: f64, scale: f64) {
        self.height = height_px.max(1.0);
        self.scale = if scale > 0.0 { scale } else { 1.0 };
    }

    fn map(&self, x: f64, y: f64) -> [f32; 2] {
        // Flip the vertical axis so (0, 0) is bottom-left.
        [(x * self.scale) as f32, (self.height - y * self.scale) as f32]
    }

    pub fn press(&mut self, id: u64, x: f64, y: f64) {
        let position = self.map(x, y);
        if let Some(tracked) = self.pointers.iter_mut().find(|tracked| tracked.id == id) {
            tracked.position = position;
        } else {
            self.pointers.push(TrackedPointer { id, position });
        }
    }

    /// Updates a tracked pointer and accumulates its movement delta. A move
    /// for an id that was never pressed is a no-op.
    pub fn motion(&mut self, id: u64, x: f64, y: f64) {
        let position = self.map(x, y);
        let Some(tracked) = self.pointers.iter_mut().find(|tracked| tracked.id == id) else {
            return;
        };
        self.movement[0] += position[0] - tracked.position[0];
        self.movement[1] += position[1] - tracked.position[1];
        tracked.position = position;
    }

    pub fn release(&mut self, id: u64) {
        self.remove(id);
    }

    pub fn cancel(&mut self, id: u64) {
        self.remove(id);
    }

    pub fn leave(&mut self, id: u64) {
        self.remove(id);
    }

    fn remove(&mut self, id: u64) {
        let Some(index) = self.pointers.iter().position(|tracked| tracked.id == id) else {
            return;
        };
        let removed = self.pointers.remove(index);
        if self.pointers.is_empty() {
            self.fallback = removed.position;
        }
    }

    pub fn is_active(&self) -> bool {
        !self.pointers.is_empty()
    }

    pub fn count(&self) -> u32 {
        self.pointers.len() as u32
    }

    /// Flattened positions of all active pointers; the empty set yields the
    /// single sentinel pair.
    pub fn coords(&self) -> Vec<f32> {
        if self.pointers.is_empty() {
            return vec![0.0, 0.0];
        }
        self.pointers
            .iter()
            .flat_map(|tracked| tracked.position)
            .collect()
    }

    /// Earliest-registered active pointer, or the fallback if none are active.
    pub fn first(&self) -> [f32; 2] {
        self.pointers
            .first()
            .map(|tracked| tracked.position)
            .unwrap_or(self.fallback)
    }

    /// Cumulative movement delta since the last reset.
    pub fn movement(&self) -> [f32; 2] {
        self.movement
    }

    /// Clears all state, including the fallback and accumulated movement.
    pub fn reset(&mut self) {
        self.pointers.clear();
        self.fallback = [0.0, 0.0];
        self.movement = [0.0, 0.0];
    }

    pub fn snapshot(&self) -> PointerSnapshot {
        PointerSnapshot {
            count: self.count(),
            coords: self.coords(),
            primary: self.first(),
            movement: self.movement,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tracker(height: f64, scale: f64) -> PointerTracker {
        let mut tracker = PointerTracker::new();
        tracker.set_viewport(height, scale);
        tracker
    }

    #[test]
    fn maps_to_bottom_left_device_pixels() {
        let mut tracker = tracker(200.0, 2.0);
        tracker.press(1, 10.0, 20.0);
        assert_eq!(tracker.first(), [20.0, 160.0]);
    }

    #[test]
    fn movement_accumulates_until_reset() {
        let mut tracker = tracker(100.0, 1.0);
        tracker.press(7, 10.0, 90.0);
        tracker.motion(7, 13.0, 88.0);
        tracker.motion(7, 18.0, 83.0);
        // dx = 3 + 5, dy (flipped) = 2 + 5.
        assert_eq!(tracker.movement(), [8.0, 7.0]);
        tracker.release(7);
        assert_eq!(tracker.movement(), [8.0, 7.0]);
        tracker.reset();
        assert_eq!(tracker.movement(), [0.0, 0.0]);
    }

    #[test]
    fn releasing_last_pointer_retains_fallback() {
        let mut tracker = tracker(100.0, 1.0);
        tracker.press(1, 40.0, 60.0);
        tracker.motion(1, 42.0, 58.0);
        tracker.release(1);
        assert!(!tracker.is_active());
        assert_eq!(tracker.first(), [42.0, 42.0]);
        // The sentinel replaces real coords once the set is empty.
        assert_eq!(tracker.coords(), vec![0.0, 0.0]);
    }

    #[test]
    fn fallback_not_updated_while_others_remain() {
        let mut tracker = tracker(100.0, 1.0);
        tracker.press(1, 10.0, 10.0);
        tracker.press(2, 20.0, 20.0);
        tracker.release(1);
        assert!(tracker.is_active());
        assert_eq!(tracker.first(), [20.0, 80.0]);
        tracker.release(2);
        assert_eq!(tracker.first(), [20.0, 80.0]);
    }

    #[test]
    fn motion_before_press_is_ignored() {
        let mut tracker = tracker(100.0, 1.0);
        tracker.motion(5, 30.0, 30.0);
        assert_eq!(tracker.movement(), [0.0, 0.0]);
        assert!(!tracker.is_active());
    }

    #[test]
    fn coords_flatten_in_press_order() {
        let mut tracker = tracker(100.0, 1.0);
        tracker.press(3, 1.0, 99.0);
        tracker.press(9, 2.0, 98.0);
        assert_eq!(tracker.coords(), vec![1.0, 1.0, 2.0, 2.0]);
        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.count, 2);
        assert_eq!(snapshot.primary, [1.0, 1.0]);
    }

    #[test]
    fn reset_clears_fallback() {
        let mut tracker = tracker(100.0, 1.0);
        tracker.press(1, 50.0, 50.0);
        tracker.release(1);
        tracker.reset();
        assert_eq!(tracker.first(), [0.0, 0.0]);
    }
}

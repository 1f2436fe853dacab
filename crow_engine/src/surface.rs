//! Surface events from the window provider
//!
//! The window library calls into the engine through an explicit event
//! queue instead of stashing an engine pointer in the window's user
//! data: the provider's callback pushes, the run loop polls. Core
//! carries no window-library dependency.

use std::collections::VecDeque;
use std::sync::Mutex;

/// Event reported by the window/surface provider
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceEvent {
    /// Framebuffer size changed; surface-sized resources must be rebuilt
    Resized { width: u32, height: u32 },

    /// The user asked to close the window
    CloseRequested,
}

/// Thread-safe FIFO of surface events
///
/// # Example
///
/// ```
/// use crow_engine::surface::{SurfaceEvent, SurfaceEventQueue};
///
/// let queue = SurfaceEventQueue::new();
/// queue.push(SurfaceEvent::Resized { width: 800, height: 600 });
/// while let Some(event) = queue.poll() {
///     // react to the event
/// }
/// ```
#[derive(Default)]
pub struct SurfaceEventQueue {
    events: Mutex<VecDeque<SurfaceEvent>>,
}

impl SurfaceEventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an event (called from the provider's callback)
    pub fn push(&self, event: SurfaceEvent) {
        self.events.lock().unwrap().push_back(event);
    }

    /// Dequeue the oldest pending event
    pub fn poll(&self) -> Option<SurfaceEvent> {
        self.events.lock().unwrap().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().unwrap().is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "surface_tests.rs"]
mod tests;

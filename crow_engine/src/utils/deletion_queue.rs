/// Deferred-cleanup registry with stack (LIFO) ordering.
///
/// Resources register a cleanup action when they are created; `flush`
/// runs all pending actions in exact reverse-registration order, so a
/// dependent registered before its dependency is torn down after it
/// (e.g. a view before the image it views).
///
/// Rust destructors cover single objects; this queue exists for
/// teardown whose order must be controlled across otherwise-unrelated,
/// differently-timed allocations, such as device-global handles and
/// frame-slot-scoped staging resources. One instance has engine
/// lifetime; each frame slot carries its own for resources scoped to
/// a reuse cycle.
///
/// # Example
///
/// ```
/// use crow_engine::utils::DeletionQueue;
///
/// let mut queue = DeletionQueue::new();
/// queue.push(|| println!("image destroyed"));
/// queue.push(|| println!("view destroyed"));
/// queue.flush(); // view first, then image
/// ```
#[derive(Default)]
pub struct DeletionQueue {
    deletors: Vec<Box<dyn FnOnce() + Send>>,
}

impl DeletionQueue {
    /// Create a new empty queue
    pub fn new() -> Self {
        Self {
            deletors: Vec::new(),
        }
    }

    /// Register a cleanup action
    ///
    /// Push a dependent's cleanup *before* the dependency it needs to
    /// outlive, so reverse execution tears down in the correct order.
    pub fn push<F: FnOnce() + Send + 'static>(&mut self, cleanup: F) {
        self.deletors.push(Box::new(cleanup));
    }

    /// Execute all pending actions in reverse-registration order, then
    /// clear the queue. Flushing an empty queue is a no-op.
    pub fn flush(&mut self) {
        while let Some(cleanup) = self.deletors.pop() {
            cleanup();
        }
    }

    /// Number of pending actions
    pub fn len(&self) -> usize {
        self.deletors.len()
    }

    /// Whether no actions are pending
    pub fn is_empty(&self) -> bool {
        self.deletors.is_empty()
    }
}

impl Drop for DeletionQueue {
    fn drop(&mut self) {
        self.flush();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "deletion_queue_tests.rs"]
mod tests;

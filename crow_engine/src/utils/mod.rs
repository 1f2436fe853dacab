/// Utility types shared across the engine

pub mod deletion_queue;
pub mod align;

pub use deletion_queue::DeletionQueue;
pub use align::pad_uniform_size;

//! Frame pipelining
//!
//! The CPU records frame K+1 while the GPU executes frame K; the
//! [`FrameRing`] owns the per-slot contexts and synchronization that
//! make that safe.

pub mod frame_ring;

pub use frame_ring::{FrameRing, FrameRingConfig, FrameSlot, FrameStatus, FRAME_OVERLAP};

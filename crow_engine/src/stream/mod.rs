//! Frame streaming
//!
//! Mirrors rendered pixels to a remote viewer over TCP. Fully
//! decoupled from the rendering core: the host is handed a raw pixel
//! buffer plus row pitch and everything else is plain socket plumbing.
//!
//! Wire format: a fixed 16-byte little-endian header
//! `[i64 payload_length][i64 row_pitch]` followed by exactly
//! `payload_length` payload bytes.

pub mod protocol;
pub mod service;

pub use protocol::{FrameDecoder, FrameHeader, StreamedFrame, HEADER_SIZE};
pub use service::{recv_frame, send_frame, FrameStreamClient, FrameStreamHost, FrameStreamSender};

//! Frame-stream wire protocol

use crate::error::{Error, Result};
use std::collections::VecDeque;

/// Fixed header size: two little-endian i64 fields
pub const HEADER_SIZE: usize = 16;

/// Payloads above this are rejected as corrupt headers
const MAX_PAYLOAD: i64 = 256 * 1024 * 1024;

/// Frame header: `[i64 payload_length][i64 row_pitch]`, little-endian
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub payload_length: i64,
    pub row_pitch: i64,
}

impl FrameHeader {
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..8].copy_from_slice(&self.payload_length.to_le_bytes());
        bytes[8..].copy_from_slice(&self.row_pitch.to_le_bytes());
        bytes
    }

    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Self {
        Self {
            payload_length: i64::from_le_bytes(bytes[..8].try_into().unwrap()),
            row_pitch: i64::from_le_bytes(bytes[8..].try_into().unwrap()),
        }
    }
}

/// One received frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamedFrame {
    pub header: FrameHeader,
    pub payload: Vec<u8>,
}

/// Incremental frame decoder
///
/// Socket reads fragment arbitrarily, so the decoder accumulates
/// whatever it is fed: partial headers, partial payloads, or several
/// frames at once. Completed frames queue up for [`Self::take_frame`].
#[derive(Default)]
pub struct FrameDecoder {
    header_bytes: Vec<u8>,
    current: Option<FrameHeader>,
    payload: Vec<u8>,
    completed: VecDeque<StreamedFrame>,
    total_consumed: u64,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Consume `input`, returning the number of bytes consumed (always
    /// all of it; partial frames are buffered)
    pub fn feed(&mut self, input: &[u8]) -> Result<usize> {
        let mut rest = input;
        while !rest.is_empty() {
            match self.current {
                None => {
                    let take = (HEADER_SIZE - self.header_bytes.len()).min(rest.len());
                    self.header_bytes.extend_from_slice(&rest[..take]);
                    rest = &rest[take..];

                    if self.header_bytes.len() == HEADER_SIZE {
                        let mut raw = [0u8; HEADER_SIZE];
                        raw.copy_from_slice(&self.header_bytes);
                        self.header_bytes.clear();

                        let header = FrameHeader::decode(&raw);
                        if header.payload_length < 0 || header.payload_length > MAX_PAYLOAD {
                            return Err(Error::InvalidResource(format!(
                                "Frame header claims payload of {} bytes",
                                header.payload_length
                            )));
                        }
                        if header.row_pitch < 0 {
                            return Err(Error::InvalidResource(format!(
                                "Frame header claims row pitch of {}",
                                header.row_pitch
                            )));
                        }
                        self.payload = Vec::with_capacity(header.payload_length as usize);
                        self.current = Some(header);
                        self.finish_if_complete();
                    }
                }
                Some(header) => {
                    let need = header.payload_length as usize - self.payload.len();
                    let take = need.min(rest.len());
                    self.payload.extend_from_slice(&rest[..take]);
                    rest = &rest[take..];
                    self.finish_if_complete();
                }
            }
        }
        self.total_consumed += input.len() as u64;
        Ok(input.len())
    }

    /// Pop the oldest completed frame
    pub fn take_frame(&mut self) -> Option<StreamedFrame> {
        self.completed.pop_front()
    }

    /// Header of the frame currently being assembled
    pub fn pending_header(&self) -> Option<FrameHeader> {
        self.current
    }

    /// Total bytes consumed over the decoder's lifetime
    pub fn bytes_consumed(&self) -> u64 {
        self.total_consumed
    }

    fn finish_if_complete(&mut self) {
        if let Some(header) = self.current {
            if self.payload.len() == header.payload_length as usize {
                self.completed.push_back(StreamedFrame {
                    header,
                    payload: std::mem::take(&mut self.payload),
                });
                self.current = None;
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;

//! Frame-stream host and client
//!
//! The host side serializes frames onto any `Write`; the client side
//! drives a [`FrameDecoder`] over any `Read`. Thin TCP wrappers over
//! `std::net` cover the common one-viewer case.

use crate::engine_info;
use crate::error::{Error, Result};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream, ToSocketAddrs};

use super::protocol::{FrameDecoder, FrameHeader, StreamedFrame};

const LOG_SOURCE: &str = "crow::FrameStream";

const READ_CHUNK: usize = 4096;

/// Write one frame: header, then the payload bytes
pub fn send_frame<W: Write>(writer: &mut W, payload: &[u8], row_pitch: i64) -> Result<()> {
    let header = FrameHeader {
        payload_length: payload.len() as i64,
        row_pitch,
    };
    writer.write_all(&header.encode())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Read from `reader` until `decoder` completes one frame
///
/// A closed stream before frame completion is an error.
pub fn recv_frame<R: Read>(reader: &mut R, decoder: &mut FrameDecoder) -> Result<StreamedFrame> {
    loop {
        if let Some(frame) = decoder.take_frame() {
            return Ok(frame);
        }
        let mut chunk = [0u8; READ_CHUNK];
        let read = reader.read(&mut chunk)?;
        if read == 0 {
            return Err(Error::BackendError(
                "Frame stream closed mid-frame".to_string(),
            ));
        }
        decoder.feed(&chunk[..read])?;
    }
}

/// Accepts one remote viewer and streams frames to it
pub struct FrameStreamHost {
    listener: TcpListener,
}

impl FrameStreamHost {
    /// Bind the streaming endpoint
    pub fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        engine_info!(
            LOG_SOURCE,
            "Streaming host listening on {}",
            listener.local_addr()?
        );
        Ok(Self { listener })
    }

    /// Local address, useful when bound to port 0
    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Block until a viewer connects
    pub fn accept(&self) -> Result<FrameStreamSender> {
        let (stream, peer) = self.listener.accept()?;
        engine_info!(LOG_SOURCE, "Viewer connected from {}", peer);
        Ok(FrameStreamSender { stream })
    }
}

/// Connected host-side sender
pub struct FrameStreamSender {
    stream: TcpStream,
}

impl FrameStreamSender {
    /// Send one rendered frame's pixels
    pub fn send(&mut self, payload: &[u8], row_pitch: i64) -> Result<()> {
        send_frame(&mut self.stream, payload, row_pitch)
    }
}

/// Remote viewer receiving streamed frames
pub struct FrameStreamClient {
    stream: TcpStream,
    decoder: FrameDecoder,
}

impl FrameStreamClient {
    /// Connect to a streaming host
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)?;
        Ok(Self {
            stream,
            decoder: FrameDecoder::new(),
        })
    }

    /// Block until the next full frame arrives
    pub fn recv(&mut self) -> Result<StreamedFrame> {
        recv_frame(&mut self.stream, &mut self.decoder)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;

//! Tokio codec for newline-delimited JSON frames

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

use crate::error::ProtocolError;
use crate::message::Frame;

/// Maximum encoded frame size (1MB), excluding the trailing newline
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Codec for encoding/decoding protocol frames, one JSON document per line
#[derive(Debug)]
pub struct JsonLinesCodec {
    lines: LinesCodec,
}

impl JsonLinesCodec {
    /// Create a new codec
    pub fn new() -> Self {
        Self {
            lines: LinesCodec::new_with_max_length(MAX_FRAME_SIZE),
        }
    }

    fn parse(line: &str) -> Result<Frame, ProtocolError> {
        Ok(serde_json::from_str(line)?)
    }
}

impl Default for JsonLinesCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl From<LinesCodecError> for ProtocolError {
    fn from(e: LinesCodecError) -> Self {
        match e {
            LinesCodecError::MaxLineLengthExceeded => ProtocolError::FrameTooLarge {
                max: MAX_FRAME_SIZE,
            },
            LinesCodecError::Io(e) => ProtocolError::Io(e),
        }
    }
}

impl Decoder for JsonLinesCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Blank lines are keepalives
        loop {
            match self.lines.decode(src)? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Self::parse(&line).map(Some),
                None => return Ok(None),
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            match self.lines.decode_eof(src)? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Self::parse(&line).map(Some),
                None => return Ok(None),
            }
        }
    }
}

impl Encoder<Frame> for JsonLinesCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = serde_json::to_vec(&frame)?;
        if payload.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::FrameTooLarge {
                max: MAX_FRAME_SIZE,
            });
        }

        dst.reserve(payload.len() + 1);
        dst.extend_from_slice(&payload);
        dst.put_u8(b'\n');
        Ok(())
    }
}

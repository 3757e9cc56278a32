// MIT License - Copyright (c) 2026 Peter Wright
// TPI frame codec

use tracing::warn;

use crate::constants::{CHECKSUM_LEN, CODE_LEN, CR, LF, MAX_PENDING_FRAME, TERMINATOR};
use crate::error::{Result, TpiError};
use crate::table::{CommandDescriptor, CommandTable};

/// Split one chunk into frames on CR and LF, discarding empty tokens.
///
/// Each chunk is split on its own; a frame cut across two reads comes back
/// as two fragments. [`FrameBuffer`] is the stream-aware variant.
pub fn tokenize(chunk: &str) -> Vec<String> {
    chunk
        .split(['\r', '\n'])
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Look up the frame's 3-character code in the command table.
pub fn identify<'a, 'f>(
    table: &'a CommandTable,
    frame: &'f str,
) -> Option<(&'f str, &'a CommandDescriptor)> {
    let code = frame.get(..CODE_LEN)?;
    table.get(code).map(|descriptor| (code, descriptor))
}

/// Sum of the command's byte values, modulo 256.
pub fn checksum(command: &str) -> u8 {
    command.bytes().fold(0u8, |acc, b| acc.wrapping_add(b))
}

/// Encode a command for the wire: command, two uppercase hex checksum digits, CR LF.
///
/// e.g., "001" → "00191\r\n"
pub fn encode(command: &str) -> String {
    format!("{}{:02X}{}", command, checksum(command), TERMINATOR)
}

/// Make the terminator visible for log lines.
pub fn escape_terminator(encoded: &str) -> String {
    encoded.replace('\r', "\\r").replace('\n', "\\n")
}

/// Extract a fixed-width field, failing if the frame is too short.
pub fn field(frame: &str, start: usize, len: usize) -> Result<&str> {
    frame.get(start..start + len).ok_or_else(|| {
        TpiError::malformed(
            frame,
            format!("expected {len} characters at offset {start}, frame is {} long", frame.len()),
        )
    })
}

/// Extract a fixed-width decimal field.
pub fn numeric_field(frame: &str, start: usize, len: usize) -> Result<u32> {
    let text = field(frame, start, len)?;
    if !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TpiError::malformed(
            frame,
            format!("non-numeric field {text:?} at offset {start}"),
        ));
    }
    text.parse::<u32>()
        .map_err(|e| TpiError::malformed(frame, format!("field {text:?}: {e}")))
}

/// Text between the command code and the checksum trailer.
///
/// e.g., "609001CS" → "001". Empty when the frame has nothing in between.
pub fn payload(frame: &str) -> &str {
    let end = frame.len().saturating_sub(CHECKSUM_LEN);
    frame.get(CODE_LEN..end).unwrap_or("")
}

/// Reassembles frames from a byte stream.
///
/// Complete frames are yielded as soon as their terminator arrives; an
/// unterminated tail is carried into the next [`push`](Self::push).
#[derive(Debug, Default)]
pub struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read's worth of bytes and drain every complete frame.
    pub fn push(&mut self, data: &[u8]) -> Vec<String> {
        let mut frames = Vec::new();
        let mut start = 0;

        for (i, &b) in data.iter().enumerate() {
            if b == CR || b == LF {
                self.pending.extend_from_slice(&data[start..i]);
                if !self.pending.is_empty() {
                    frames.push(String::from_utf8_lossy(&self.pending).into_owned());
                    self.pending.clear();
                }
                start = i + 1;
            }
        }

        self.pending.extend_from_slice(&data[start..]);
        if self.pending.len() > MAX_PENDING_FRAME {
            warn!(
                "Discarding {} bytes of unterminated data",
                self.pending.len()
            );
            self.pending.clear();
        }

        frames
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

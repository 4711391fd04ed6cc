//! Fixed-layout binary codec.
//!
//! ```text
//! offset  size        field
//! 0       1           kind tag (0 = JoinRequest, 1 = JoinResponse, 2 = Heartbeat)
//! 1       4           sender id   (u32)
//! 5       2           sender port (u16)
//! -- JoinRequest --
//! 7       8           heartbeat (i64)
//! -- JoinResponse / Heartbeat --
//! 7       4           entry count (u32)
//! 11      14 * count  records: id (u32), port (u16), heartbeat (i64)
//! ```
//!
//! All integers are little-endian. Bytes after the last record are ignored.

use super::message::{Message, MessageKind, WireEntry};
use crate::NodeIdentity;
use thiserror::Error;

/// Kind tag plus sender identity.
pub const HEADER_LEN: usize = 7;

/// One `(id, port, heartbeat)` record.
pub const RECORD_LEN: usize = 14;

/// Total size of an encoded join request.
pub const JOIN_REQUEST_LEN: usize = HEADER_LEN + 8;

/// Upper bound on the entry count accepted from the wire.
pub const MAX_ENTRIES: usize = 65_536;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Message truncated")]
    Truncated,

    #[error("Unknown message kind: {0}")]
    UnknownKind(u8),

    #[error("Too many entries: {0} (max {MAX_ENTRIES})")]
    TooManyEntries(u32),
}

/// Encode a message.
///
/// Entry lists longer than [`MAX_ENTRIES`] are cut at the limit so the
/// output always decodes.
pub fn encode(message: &Message) -> Vec<u8> {
    match message {
        Message::JoinRequest { sender, heartbeat } => {
            let mut buf = Vec::with_capacity(JOIN_REQUEST_LEN);
            put_header(&mut buf, MessageKind::JoinRequest, *sender);
            buf.extend_from_slice(&heartbeat.to_le_bytes());
            buf
        }
        Message::JoinResponse { sender, entries } => {
            encode_list(MessageKind::JoinResponse, *sender, entries)
        }
        Message::Heartbeat { sender, entries } => {
            encode_list(MessageKind::Heartbeat, *sender, entries)
        }
    }
}

fn encode_list(kind: MessageKind, sender: NodeIdentity, entries: &[WireEntry]) -> Vec<u8> {
    let entries = &entries[..entries.len().min(MAX_ENTRIES)];
    let mut buf = Vec::with_capacity(HEADER_LEN + 4 + entries.len() * RECORD_LEN);
    put_header(&mut buf, kind, sender);
    // Bounded by MAX_ENTRIES above
    buf.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for entry in entries {
        put_identity(&mut buf, entry.identity);
        buf.extend_from_slice(&entry.heartbeat.to_le_bytes());
    }
    buf
}

fn put_header(buf: &mut Vec<u8>, kind: MessageKind, sender: NodeIdentity) {
    buf.push(kind.tag());
    put_identity(buf, sender);
}

fn put_identity(buf: &mut Vec<u8>, identity: NodeIdentity) {
    buf.extend_from_slice(identity.address().as_bytes());
}

/// Decode a message.
///
/// Never reads past the end of `data`; every short buffer is reported as
/// [`DecodeError::Truncated`].
pub fn decode(data: &[u8]) -> Result<Message, DecodeError> {
    let mut reader = Reader::new(data);

    // Length is checked before the tag so short buffers are Truncated for every kind
    if data.len() < HEADER_LEN {
        return Err(DecodeError::Truncated);
    }
    let tag = reader.u8()?;
    let kind = MessageKind::from_tag(tag).ok_or(DecodeError::UnknownKind(tag))?;
    let sender = reader.identity()?;

    match kind {
        MessageKind::JoinRequest => {
            let heartbeat = reader.i64()?;
            Ok(Message::JoinRequest { sender, heartbeat })
        }
        MessageKind::JoinResponse => Ok(Message::JoinResponse {
            sender,
            entries: decode_entries(&mut reader)?,
        }),
        MessageKind::Heartbeat => Ok(Message::Heartbeat {
            sender,
            entries: decode_entries(&mut reader)?,
        }),
    }
}

fn decode_entries(reader: &mut Reader<'_>) -> Result<Vec<WireEntry>, DecodeError> {
    let count = reader.u32()?;
    let needed = u64::from(count) * RECORD_LEN as u64;
    if (reader.remaining() as u64) < needed {
        return Err(DecodeError::Truncated);
    }
    if count as usize > MAX_ENTRIES {
        return Err(DecodeError::TooManyEntries(count));
    }

    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let identity = reader.identity()?;
        let heartbeat = reader.i64()?;
        entries.push(WireEntry::new(identity, heartbeat));
    }
    Ok(entries)
}

/// Bounds-checked cursor over an input buffer.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let bytes = self
            .data
            .get(self.pos..self.pos + N)
            .ok_or(DecodeError::Truncated)?;
        self.pos += N;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take::<1>()?[0])
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    fn i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.take()?))
    }

    fn identity(&mut self) -> Result<NodeIdentity, DecodeError> {
        Ok(crate::Address::from_bytes(self.take()?).identity())
    }
}

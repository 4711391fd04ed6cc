//! Wire protocol for membership messages.
//!
//! - Message types (join request, join response, heartbeat)
//! - Fixed-layout binary codec with length-checked decoding

pub mod codec;
pub mod message;

pub use codec::{DecodeError, decode, encode};
pub use message::{Message, MessageKind, WireEntry};

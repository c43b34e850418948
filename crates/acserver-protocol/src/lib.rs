//! Assetto Corsa dedicated server UDP plugin protocol codec.
//!
//! The server talks to plugins over a UDP side-channel. Each datagram is one
//! message: a leading tag byte followed by a fixed layout of fields.
//!
//! | Field kind   | Encoding |
//! |--------------|----------|
//! | integers     | fixed width, little-endian |
//! | vectors      | 3 × f32 |
//! | narrow text  | u8 byte count + UTF-8 bytes |
//! | wide text    | u8 char count + UTF-32LE (4 bytes/char) |
//!
//! Decoding is strict: unknown tags, short datagrams and trailing bytes are
//! all errors. The caller decides what to do with a bad datagram; the
//! codec itself has no side effects.
//!
//! # Usage
//!
//! ```rust
//! use openracing_acserver_protocol::{Message, decode, encode};
//!
//! # fn main() -> Result<(), openracing_acserver_protocol::CodecError> {
//! let request = Message::GetCarInfo { car_id: 3 };
//! let bytes = encode(&request)?;
//! assert_eq!(decode(&bytes)?, request);
//! # Ok(())
//! # }
//! ```

#![deny(static_mut_refs)]

pub mod error;
pub mod message;
pub mod wire;

pub use error::{CodecError, CodecResult};
pub use message::{
    CURRENT_SESSION_INDEX, CarInfoMessage, CarUpdateMessage, ClientEventKind, ClientEventMessage,
    ConnectionMessage, Direction, LapCompletedMessage, LeaderboardEntry, Message, MessageKind,
    PROTOCOL_VERSION, REGISTRY, SessionInfoMessage, SetSessionMessage, decode, encode, tags,
};
pub use wire::{MAX_STRING_LEN, PacketReader, PacketWriter, Vector3};

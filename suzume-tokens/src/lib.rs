//! IRC message tokens for suzume.
//!
//! This crate holds the wire-level vocabulary of the server: [`Message`] and
//! [`Prefix`] values, the command verbs ([`cmd`]) and reply numerics
//! ([`rpl`]), and a [`Codec`] that frames messages over any byte stream with
//! `tokio_util`.
//!
//! Messages follow the RFC 2812 shape:
//!
//! ```text
//! [:prefix] COMMAND param1 param2 [:trailing]\r\n
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, rust_2018_idioms)]

pub use codec::{Codec, CodecError, MAX_LINE_LENGTH};
pub use message::{Message, Prefix};

pub mod cmd;
pub mod rpl;

mod codec;
mod message;

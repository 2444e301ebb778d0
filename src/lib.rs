//! suzume, a small embeddable IRC server toolkit.
//!
//! The crate implements the useful core of RFC 2812 group chat.  A
//! [`Server`] holds the registry of users and channels; every accepted
//! connection becomes a [`User`] once it passes the registration handshake;
//! [`Channel`]s fan messages out to their members.  State transitions are
//! published as [`Event`]s to any subscribed queue.
//!
//! The engine embeds into any stream transport: hand [`Server::connect`] a
//! [`User`] wrapped around anything `AsyncRead + AsyncWrite`.  The `suzume`
//! binary pairs the engine with a plain TCP listener (see [`net`]).
//!
//! # Example
//!
//! ```rust
//! use futures::{SinkExt, StreamExt};
//! use suzume::{Server, User};
//! use suzume_tokens::{Codec, Message};
//! use tokio_util::codec::Framed;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let server = Server::new("example.irc");
//! let (ours, theirs) = tokio::io::duplex(1024);
//!
//! tokio::spawn({
//!     let server = server.clone();
//!     async move { server.connect(User::new(ours)).await }
//! });
//!
//! let mut client = Framed::new(theirs, Codec);
//! client.send(Message::parse("NICK rico").unwrap()).await.unwrap();
//! client.send(Message::parse("USER rico 0 * :Rico").unwrap()).await.unwrap();
//!
//! let welcome = client.next().await.unwrap().unwrap();
//! assert_eq!(welcome.to_string(), ":example.irc 001 rico :Welcome!");
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, rust_2018_idioms)]

pub use crate::channel::Channel;
pub use crate::config::{ChannelFactory, ServerConfig};
pub use crate::conn::{Conn, Duplex};
pub use crate::event::{Event, EventKind, Publisher};
pub use crate::server::{Error, Server};
pub use crate::user::{Identity, User};

pub mod config;
pub mod net;

mod channel;
mod conn;
mod event;
mod lines;
mod server;
mod user;

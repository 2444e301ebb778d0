//! Configuration: engine settings for embedders, file settings for the
//! binary.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::{fmt, fs, process};

use serde::Deserialize;

use crate::channel::Channel;
use crate::server::Server;

/// Builds the channel when the registry creates one, letting embedders
/// pre-set topics or keep-empty behavior.  See [`Server::channel`].
pub type ChannelFactory = Arc<dyn Fn(&Server, &str) -> Arc<Channel> + Send + Sync>;

/// Engine settings, for [`Server::with_config`].
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// The server name; prefix of every server-origin message.
    pub name: String,

    /// Refuse every JOIN with `ERR_INVITEONLYCHAN`.
    pub invite_only: bool,

    /// Reap empty channels through the event bus, on a dedicated task,
    /// instead of inline from PART.
    pub discard_empty: bool,

    /// Factory for newly created channels.
    pub new_channel: Option<ChannelFactory>,
}

/// Settings of the `suzume` binary, read from a TOML file.
#[derive(Deserialize)]
pub struct Config {
    /// The server name sent as the prefix of replies.
    pub name: String,

    /// The IP and TCP port to bind.  `0.0.0.0:6667` by default.
    #[serde(default = "bind_to_address")]
    pub bind_to_address: SocketAddr,

    #[serde(default)]
    pub invite_only: bool,

    #[serde(default)]
    pub discard_empty: bool,
}

fn bind_to_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 6667))
}

impl Config {
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            name: self.name.clone(),
            invite_only: self.invite_only,
            discard_empty: self.discard_empty,
            new_channel: None,
        }
    }
}

/// Reads the configuration file at `path`, or exits with a message.
pub fn from_file(path: impl AsRef<Path>) -> Config {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).unwrap_or_else(|err| bail(path.display(), err));
    toml::from_str(&contents).unwrap_or_else(|err| bail(path.display(), err))
}

fn bail<T>(path: impl fmt::Display, err: impl fmt::Display) -> T {
    eprintln!("failed to load {}: {}", path, err);
    process::exit(1)
}

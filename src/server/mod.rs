//! The server registry and its lifecycle operations.
//!
//! This module is split in two files:
//!
//! - `mod.rs`: the public [`Server`] API — registry maps, handshake,
//!   rename, quit, unlink and the empty-channel reaper
//! - `dispatch.rs`: the per-connection command loop

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use suzume_tokens::{cmd, rpl, CodecError, Message, Prefix};
use suzume_unicase::{u, UniCase};
use tokio::sync::{mpsc, RwLock};

use crate::channel::Channel;
use crate::config::ServerConfig;
use crate::event::{Event, Publisher};
use crate::lines;
use crate::user::User;

mod dispatch;
#[cfg(test)]
mod test;

/// Messages a connection may send before completing registration.
const HANDSHAKE_BUDGET: usize = 5;

/// Queue depth of the internal empty-channel reaper.
const REAPER_QUEUE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The connection spent its message budget without giving both a nick
    /// and a username.
    #[error("handshake failed")]
    Handshake,
    /// The connection's transport failed.
    #[error(transparent)]
    Transport(#[from] CodecError),
}

/// The maps behind the registry lock: shared for lookups, exclusive for
/// insert, delete and rename.
struct Registry {
    users: HashMap<UniCase<String>, Arc<User>>,
    channels: HashMap<UniCase<String>, Arc<Channel>>,
    /// Monotonic guest counter; see [`Server::guest_nick`].
    count: u64,
}

pub(crate) struct ServerInner {
    config: ServerConfig,
    created: DateTime<Utc>,
    registry: RwLock<Registry>,
    publisher: Publisher,
}

/// Handle on a running server.  Clones are cheap and share the same state.
#[derive(Clone)]
pub struct Server(Arc<ServerInner>);

impl Server {
    /// A server with the given name and default settings.
    pub fn new(name: impl Into<String>) -> Server {
        Server::with_config(ServerConfig {
            name: name.into(),
            ..ServerConfig::default()
        })
    }

    /// A server with the given settings.
    ///
    /// With `discard_empty` set this spawns the reaper task, so it must be
    /// called from within a tokio runtime.
    pub fn with_config(config: ServerConfig) -> Server {
        let discard_empty = config.discard_empty;
        let server = Server(Arc::new(ServerInner {
            config,
            created: Utc::now(),
            registry: RwLock::new(Registry {
                users: HashMap::new(),
                channels: HashMap::new(),
                count: 0,
            }),
            publisher: Publisher::default(),
        }));
        if discard_empty {
            server.spawn_reaper();
        }
        server
    }

    /// The empty-channel reaper: listens for [`Event::EmptyChannel`] on an
    /// internal queue and unlinks the channel after revalidating it.  Holds
    /// only a weak handle, so a dropped server stops its reaper.
    fn spawn_reaper(&self) {
        let (queue, mut events) = mpsc::channel(REAPER_QUEUE);
        self.0.publisher.subscribe(queue);
        let inner = Arc::downgrade(&self.0);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                if let Event::EmptyChannel(channel) = event {
                    let Some(inner) = inner.upgrade() else { break };
                    Server(inner).reap(&channel).await;
                }
            }
        });
    }

    /// The server name; the prefix of every server-origin message.
    pub fn name(&self) -> &str {
        &self.0.config.name
    }

    pub fn prefix(&self) -> Prefix {
        Prefix::server(&self.0.config.name)
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.0.created
    }

    /// Subscribes a queue to the server's lifecycle events.
    pub fn subscribe(&self, queue: mpsc::Sender<Event>) {
        self.0.publisher.subscribe(queue);
    }

    pub(crate) async fn publish(&self, event: Event) {
        self.0.publisher.publish(event).await;
    }

    pub(crate) fn from_inner(inner: Arc<ServerInner>) -> Server {
        Server(inner)
    }

    pub(crate) fn inner(&self) -> &Arc<ServerInner> {
        &self.0
    }

    pub(crate) fn invite_only(&self) -> bool {
        self.0.config.invite_only
    }

    /// Looks up a registered user by nick.
    pub async fn has_user(&self, nick: &str) -> Option<Arc<User>> {
        self.0.registry.read().await.users.get(u(nick)).cloned()
    }

    /// Looks up an existing channel by name.
    pub async fn has_channel(&self, name: &str) -> Option<Arc<Channel>> {
        self.0.registry.read().await.channels.get(u(name)).cloned()
    }

    /// Returns the channel with the given name, creating it if needed.
    pub async fn channel(&self, name: &str) -> Arc<Channel> {
        let (channel, created) = {
            let mut registry = self.0.registry.write().await;
            match registry.channels.get(u(name)) {
                Some(channel) => (channel.clone(), false),
                None => {
                    let channel = match self.0.config.new_channel {
                        Some(ref new_channel) => new_channel(self, name),
                        None => Channel::new(self, name),
                    };
                    registry.channels.insert(channel.id(), channel.clone());
                    (channel, true)
                }
            }
        };
        if created {
            log::debug!("{}: channel created", channel.name());
            self.publish(Event::NewChannel(channel.clone())).await;
        }
        channel
    }

    /// Removes the channel from the registry without disturbing its members.
    ///
    /// The delete is identity-checked: a channel re-created under the same
    /// name since is left alone.
    pub async fn unlink_channel(&self, channel: &Arc<Channel>) {
        let mut registry = self.0.registry.write().await;
        let stored = registry
            .channels
            .get(&channel.id())
            .is_some_and(|stored| Arc::ptr_eq(stored, channel));
        if stored {
            registry.channels.remove(&channel.id());
        }
    }

    /// Moves the user to a new nick.
    ///
    /// Fails with `ERR_NICKNAMEINUSE` if any user, the renamed one included,
    /// already holds the nick.  On success the NICK message, carrying the
    /// old prefix, goes to the user and to everyone who can see them.
    pub async fn rename_user(&self, user: &Arc<User>, new_nick: &str) -> bool {
        let old_prefix;
        {
            let mut registry = self.0.registry.write().await;
            if registry.users.contains_key(u(new_nick)) {
                drop(registry);
                let _ = user
                    .encode(&[Message::new(rpl::ERR_NICKNAMEINUSE)
                        .with_prefix(self.prefix())
                        .param(new_nick)
                        .trailing(lines::NICKNAME_IN_USE)])
                    .await;
                return false;
            }
            registry.users.remove(&user.id());
            old_prefix = user.prefix();
            user.set_nick(new_nick);
            registry.users.insert(user.id(), user.clone());
        }

        let change = Message::new(cmd::NICK)
            .with_prefix(old_prefix)
            .param(new_nick);
        let _ = user.encode(std::slice::from_ref(&change)).await;
        for other in user.visible_to().await {
            let _ = other.encode(std::slice::from_ref(&change)).await;
        }
        true
    }

    /// The next `Guest<n>` nick, for embedders that assign nicks themselves.
    pub async fn guest_nick(&self) -> String {
        let mut registry = self.0.registry.write().await;
        registry.count += 1;
        format!("Guest{}", registry.count)
    }

    /// Runs the registration handshake on the user, then hands the
    /// connection to its dispatcher.
    ///
    /// Returns once the user is registered; dispatch continues in a spawned
    /// task until the connection dies.  On failure the transport is closed
    /// and no event is published.
    pub async fn connect(&self, user: Arc<User>) -> Result<(), Error> {
        if let Err(err) = self.handshake(&user).await {
            user.close().await;
            return Err(err);
        }
        log::info!("{}: registered", user.nick());
        self.publish(Event::Connect(user.clone())).await;
        tokio::spawn(dispatch::run(self.clone(), user));
        Ok(())
    }

    async fn handshake(&self, user: &Arc<User>) -> Result<(), Error> {
        for _ in 0..HANDSHAKE_BUDGET {
            let msg = user.decode().await?;

            if msg.params.is_empty() {
                let _ = user
                    .encode(&[Message::new(rpl::ERR_NEEDMOREPARAMS)
                        .with_prefix(self.prefix())
                        .param(&msg.command)])
                    .await;
                continue;
            }

            match msg.command.as_str() {
                cmd::NICK => user.set_nick(&msg.params[0]),
                cmd::USER => {
                    user.set_user(&msg.params[0]);
                    user.set_real(msg.trailing.as_deref().unwrap_or(""));
                    if user.nick().is_empty() {
                        user.set_nick(&msg.params[0]);
                    }
                }
                _ => {}
            }

            if user.nick().is_empty() || user.user_name().is_empty() {
                // Wait for both NICK and USER before registering.
                continue;
            }

            if !self.add(user).await {
                let _ = user
                    .encode(&[Message::new(rpl::ERR_NICKNAMEINUSE)
                        .with_prefix(self.prefix())
                        .param(user.nick())
                        .trailing(lines::NICKNAME_IN_USE)])
                    .await;
                continue;
            }

            let welcome = Message::new(rpl::WELCOME)
                .with_prefix(self.prefix())
                .param(user.nick())
                .trailing(lines::WELCOME);
            if let Err(err) = user.encode(&[welcome]).await {
                // Never leave a dead transport in the registry.
                self.0.registry.write().await.users.remove(&user.id());
                return Err(err.into());
            }
            return Ok(());
        }
        Err(Error::Handshake)
    }

    async fn add(&self, user: &Arc<User>) -> bool {
        let mut registry = self.0.registry.write().await;
        let id = user.id();
        if registry.users.contains_key(&id) {
            return false;
        }
        registry.users.insert(id, user.clone());
        true
    }

    /// Removes the user from the registry and from every channel, then
    /// closes its transport.  Runs on every dispatcher exit path.
    pub(crate) async fn quit(&self, user: &Arc<User>, reason: Option<&str>) {
        {
            let mut registry = self.0.registry.write().await;
            registry.users.remove(&user.id());
        }
        for channel in user.take_channels() {
            channel.part(user, reason).await;
        }
        user.close().await;
        log::info!("{}: disconnected", user.nick());
    }

    /// Called by a channel that just lost its last member.
    pub(crate) async fn channel_emptied(&self, channel: &Arc<Channel>) {
        self.publish(Event::EmptyChannel(channel.clone())).await;
        if !self.0.config.discard_empty {
            // Without a reaper task, the unlink happens inline.
            self.reap(channel).await;
        }
    }

    /// Unlinks the channel if it is still the one stored and still empty.
    async fn reap(&self, channel: &Arc<Channel>) {
        let mut registry = self.0.registry.write().await;
        let stored = registry
            .channels
            .get(&channel.id())
            .is_some_and(|stored| Arc::ptr_eq(stored, channel));
        if !stored || !channel.is_empty().await {
            return;
        }
        registry.channels.remove(&channel.id());
        drop(registry);
        channel.clear_server();
        log::debug!("{}: unlinked empty channel", channel.name());
    }

    /// Shuts the server down: every channel is closed, every user transport
    /// is closed (which winds each dispatcher down), and the event bus stops.
    pub async fn close(&self) {
        let (users, channels) = {
            let mut registry = self.0.registry.write().await;
            let users: Vec<_> = registry.users.drain().map(|(_, user)| user).collect();
            let channels: Vec<_> = registry
                .channels
                .drain()
                .map(|(_, channel)| channel)
                .collect();
            (users, channels)
        };
        for channel in &channels {
            channel.close().await;
            channel.clear_server();
        }
        for user in &users {
            user.close().await;
        }
        self.0.publisher.close();
    }
}

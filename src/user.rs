//! Users: one per live client connection.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};

use suzume_tokens::{CodecError, Message, Prefix};
use suzume_unicase::UniCase;

use crate::channel::Channel;
use crate::conn::{Conn, Duplex};

static NEXT_UID: AtomicU64 = AtomicU64::new(1);

/// A user's identity fields, as filled in by the handshake.
#[derive(Clone, Debug, Default)]
pub struct Identity {
    /// From the NICK command.
    pub nick: String,
    /// From the USER command.
    pub user: String,
    /// From the USER command's trailing parameter.
    pub real: String,
    /// Resolved from the peer address, `*` until known.
    pub host: String,
}

impl Identity {
    /// The `nick[!user][@host]` origin attached to this user's messages.
    pub fn prefix(&self) -> Prefix {
        Prefix {
            name: self.nick.clone(),
            user: (!self.user.is_empty()).then(|| self.user.clone()),
            host: (!self.host.is_empty()).then(|| self.host.clone()),
        }
    }
}

/// One client connection with its identity and channel memberships.
///
/// The user owns its transport.  Writes from any task go through
/// [`User::encode`], which serializes them per user; only the user's
/// dispatcher reads.
pub struct User {
    /// Stable key for membership maps; never reused, unlike the nick.
    uid: u64,
    identity: StdRwLock<Identity>,
    channels: StdMutex<HashMap<UniCase<String>, Arc<Channel>>>,
    conn: Conn,
}

impl User {
    /// Wraps a byte stream into an unregistered user with an unknown host.
    pub fn new(stream: impl Duplex) -> Arc<User> {
        User::with_host(stream, "*")
    }

    /// Wraps a byte stream, with the host string the listener resolved.
    pub fn with_host(stream: impl Duplex, host: impl Into<String>) -> Arc<User> {
        Arc::new(User {
            uid: NEXT_UID.fetch_add(1, Ordering::Relaxed),
            identity: StdRwLock::new(Identity {
                host: host.into(),
                ..Identity::default()
            }),
            channels: StdMutex::new(HashMap::new()),
            conn: Conn::new(stream),
        })
    }

    pub(crate) fn uid(&self) -> u64 {
        self.uid
    }

    /// The case-insensitive registry key for this user's nick.
    pub fn id(&self) -> UniCase<String> {
        UniCase::new(self.nick())
    }

    pub fn nick(&self) -> String {
        self.identity.read().unwrap().nick.clone()
    }

    pub fn user_name(&self) -> String {
        self.identity.read().unwrap().user.clone()
    }

    pub fn identity(&self) -> Identity {
        self.identity.read().unwrap().clone()
    }

    pub fn prefix(&self) -> Prefix {
        self.identity.read().unwrap().prefix()
    }

    pub(crate) fn set_nick(&self, nick: &str) {
        self.identity.write().unwrap().nick = nick.to_owned();
    }

    pub(crate) fn set_user(&self, user: &str) {
        self.identity.write().unwrap().user = user.to_owned();
    }

    pub(crate) fn set_real(&self, real: &str) {
        self.identity.write().unwrap().real = real.to_owned();
    }

    /// The channels this user is currently joined to.
    pub fn channels(&self) -> Vec<Arc<Channel>> {
        self.channels.lock().unwrap().values().cloned().collect()
    }

    pub(crate) fn joined(&self, channel: &Arc<Channel>) {
        self.channels
            .lock()
            .unwrap()
            .insert(channel.id(), channel.clone());
    }

    pub(crate) fn parted(&self, channel: &Channel) {
        self.channels.lock().unwrap().remove(&channel.id());
    }

    pub(crate) fn take_channels(&self) -> Vec<Arc<Channel>> {
        self.channels.lock().unwrap().drain().map(|(_, ch)| ch).collect()
    }

    /// Every other user sharing at least one channel with this one,
    /// de-duplicated.  This is the audience of a nick change.
    pub async fn visible_to(&self) -> Vec<Arc<User>> {
        let mut seen = HashSet::new();
        seen.insert(self.uid);
        let mut visible = Vec::new();
        for channel in self.channels() {
            for member in channel.users().await {
                if seen.insert(member.uid) {
                    visible.push(member);
                }
            }
        }
        visible
    }

    /// Writes a batch of messages to this user, in order, atomically.
    pub async fn encode(&self, msgs: &[Message]) -> Result<(), CodecError> {
        for msg in msgs {
            log::debug!("-> {}", msg);
        }
        self.conn.encode(msgs).await
    }

    /// Reads the next message from this user.  Single consumer.
    pub async fn decode(&self) -> Result<Message, CodecError> {
        let msg = self.conn.decode().await?;
        log::debug!("<- {}", msg);
        Ok(msg)
    }

    /// Closes the transport.  Idempotent.
    pub async fn close(&self) {
        self.conn.close().await;
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let identity = self.identity.read().unwrap();
        f.debug_struct("User")
            .field("nick", &identity.nick)
            .field("user", &identity.user)
            .field("host", &identity.host)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_omits_empty_fields() {
        let identity = Identity {
            nick: "foo".to_owned(),
            ..Identity::default()
        };
        assert_eq!(identity.prefix().to_string(), "foo");

        let identity = Identity {
            nick: "foo".to_owned(),
            user: "root".to_owned(),
            real: "Foo Bar".to_owned(),
            host: "client1".to_owned(),
        };
        assert_eq!(identity.prefix().to_string(), "foo!root@client1");
    }

    #[tokio::test]
    async fn uids_are_unique() {
        let (a, _x) = tokio::io::duplex(64);
        let (b, _y) = tokio::io::duplex(64);
        assert_ne!(User::new(a).uid(), User::new(b).uid());
    }

    #[tokio::test]
    async fn id_is_case_insensitive() {
        let (stream, _peer) = tokio::io::duplex(64);
        let user = User::new(stream);
        user.set_nick("FooBar");
        assert_eq!(user.id(), UniCase::new("foobar"));
    }
}

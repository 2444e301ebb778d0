//! Channels: named multicast rooms.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, Weak};

use suzume_tokens::{cmd, rpl, CodecError, Message, Prefix};
use suzume_unicase::UniCase;
use tokio::sync::RwLock;

use crate::lines;
use crate::server::{Server, ServerInner};
use crate::user::User;

/// Fields guarded by the channel lock: shared for enumeration and message
/// fan-out, exclusive for join, part and close.
#[derive(Default)]
struct ChannelState {
    topic: String,
    /// Members, keyed by their stable uid.
    members: HashMap<u64, Arc<User>>,
}

/// One active channel.
///
/// A channel holds a back-reference to its server so it can ask to be
/// unlinked once its last member leaves; the reference is weak and cleared
/// on unlink, so a channel never keeps a server alive.
pub struct Channel {
    this: Weak<Channel>,
    server: StdMutex<Weak<ServerInner>>,
    server_name: String,
    name: String,
    /// Skip unlinking this channel when it empties.
    keep_empty: bool,
    state: RwLock<ChannelState>,
}

impl Channel {
    /// Creates a channel linked to the given server.
    ///
    /// The channel is not inserted into the server's registry; that is
    /// [`Server::channel`]'s job.
    pub fn new(server: &Server, name: &str) -> Arc<Channel> {
        Channel::create(server, name, false)
    }

    /// Creates a channel that survives losing its last member.
    pub fn new_keep_empty(server: &Server, name: &str) -> Arc<Channel> {
        Channel::create(server, name, true)
    }

    fn create(server: &Server, name: &str, keep_empty: bool) -> Arc<Channel> {
        Arc::new_cyclic(|this| Channel {
            this: this.clone(),
            server: StdMutex::new(Arc::downgrade(server.inner())),
            server_name: server.name().to_owned(),
            name: name.to_owned(),
            keep_empty,
            state: RwLock::default(),
        })
    }

    /// The channel name, with the casing it was created with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The case-insensitive registry key for this channel.
    pub fn id(&self) -> UniCase<String> {
        UniCase::new(self.name.clone())
    }

    pub async fn topic(&self) -> String {
        self.state.read().await.topic.clone()
    }

    pub async fn set_topic(&self, topic: impl Into<String>) {
        self.state.write().await.topic = topic.into();
    }

    /// Introduces the user to the channel.
    ///
    /// Everyone in the channel, the newcomer included, sees the JOIN; the
    /// newcomer alone then receives the name list and the topic.  Joining a
    /// channel twice has no effect.  Returns whether the user was actually
    /// added; the error is a write failure towards the joining user.
    pub async fn join(&self, user: &Arc<User>) -> Result<bool, CodecError> {
        let mut state = self.state.write().await;
        if state.members.contains_key(&user.uid()) {
            return Ok(false);
        }
        let topic = state.topic.clone();
        state.members.insert(user.uid(), user.clone());
        user.joined(&self.arc());

        let join = Message::new(cmd::JOIN)
            .with_prefix(user.prefix())
            .param(&self.name);
        for member in state.members.values() {
            let _ = member.encode(std::slice::from_ref(&join)).await;
        }
        let names = names_in(&state);
        drop(state);

        let nick = user.nick();
        let topic_reply = if topic.is_empty() {
            Message::new(rpl::NOTOPIC)
                .with_prefix(self.server_prefix())
                .param(&self.name)
                .trailing(lines::NO_TOPIC)
        } else {
            Message::new(rpl::TOPIC)
                .with_prefix(self.server_prefix())
                .param(&self.name)
                .trailing(topic)
        };
        user.encode(&[
            Message::new(rpl::NAMREPLY)
                .with_prefix(self.server_prefix())
                .param(&nick)
                .param("=")
                .param(&self.name)
                .trailing(names.join(" ")),
            Message::new(rpl::ENDOFNAMES)
                .with_prefix(self.server_prefix())
                .param(&nick)
                .trailing(lines::END_OF_NAMES),
            topic_reply,
        ])
        .await?;
        Ok(true)
    }

    /// Removes the user from the channel, after showing everyone the PART.
    ///
    /// A non-member is told `ERR_NOTONCHANNEL` instead.  When the last
    /// member leaves a channel that is not `keep_empty`, the channel asks
    /// its server to unlink it.  Returns whether the user was a member.
    pub async fn part(&self, user: &Arc<User>, reason: Option<&str>) -> bool {
        let mut state = self.state.write().await;
        if !state.members.contains_key(&user.uid()) {
            drop(state);
            let _ = user
                .encode(&[Message::new(rpl::ERR_NOTONCHANNEL)
                    .with_prefix(self.server_prefix())
                    .param(&self.name)
                    .trailing(lines::NOT_ON_CHANNEL)])
                .await;
            return false;
        }

        let mut part = Message::new(cmd::PART)
            .with_prefix(user.prefix())
            .param(&self.name);
        if let Some(reason) = reason {
            part = part.trailing(reason);
        }
        for member in state.members.values() {
            let _ = member.encode(std::slice::from_ref(&part)).await;
        }
        state.members.remove(&user.uid());
        user.parted(self);
        let emptied = state.members.is_empty();
        drop(state);

        if emptied && !self.keep_empty {
            if let Some(server) = self.server_handle() {
                server.channel_emptied(&self.arc()).await;
            }
        }
        true
    }

    /// Relays a message to every member but the sender.
    pub async fn message(&self, from: &Arc<User>, text: &str) {
        let msg = Message::new(cmd::PRIVMSG)
            .with_prefix(from.prefix())
            .param(&self.name)
            .trailing(text);
        let state = self.state.read().await;
        for (uid, member) in &state.members {
            if *uid == from.uid() {
                continue;
            }
            let _ = member.encode(std::slice::from_ref(&msg)).await;
        }
    }

    /// Evicts every member.  Each one sees a PART under their own prefix,
    /// the mark of a server-initiated removal.
    pub async fn close(&self) {
        let mut state = self.state.write().await;
        for member in state.members.values() {
            let part = Message::new(cmd::PART)
                .with_prefix(member.prefix())
                .param(&self.name);
            let _ = member.encode(&[part]).await;
            member.parted(self);
        }
        state.members.clear();
    }

    /// The nicks of the members, sorted.
    pub async fn names(&self) -> Vec<String> {
        names_in(&*self.state.read().await)
    }

    /// The members, in no particular order.
    pub async fn users(&self) -> Vec<Arc<User>> {
        self.state.read().await.members.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.members.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.members.is_empty()
    }

    /// Severs the back-reference; a later empty-channel signal goes nowhere.
    pub(crate) fn clear_server(&self) {
        *self.server.lock().unwrap() = Weak::new();
    }

    fn server_handle(&self) -> Option<Server> {
        self.server.lock().unwrap().upgrade().map(Server::from_inner)
    }

    fn server_prefix(&self) -> Prefix {
        Prefix::server(&self.server_name)
    }

    fn arc(&self) -> Arc<Channel> {
        self.this.upgrade().expect("channel accessed outside an Arc")
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel").field("name", &self.name).finish()
    }
}

fn names_in(state: &ChannelState) -> Vec<String> {
    let mut names: Vec<String> = state.members.values().map(|member| member.nick()).collect();
    names.sort();
    names
}

//! Server lifecycle events and their synchronous fan-out bus.

use std::sync::{Arc, Mutex as StdMutex};

use tokio::sync::{mpsc, Mutex};

use crate::channel::Channel;
use crate::user::User;

/// A state transition the server just performed.
#[derive(Clone, Debug)]
pub enum Event {
    /// A connection completed its registration handshake.
    Connect(Arc<User>),
    /// A user entered a channel.
    Join {
        user: Arc<User>,
        channel: Arc<Channel>,
    },
    /// A user left a channel.
    Part {
        user: Arc<User>,
        channel: Arc<Channel>,
        reason: Option<String>,
    },
    /// A user issued QUIT.
    Quit {
        user: Arc<User>,
        reason: Option<String>,
    },
    /// A channel was created in the registry.
    NewChannel(Arc<Channel>),
    /// A channel lost its last member.
    EmptyChannel(Arc<Channel>),
    /// A private message between two users.
    UserMsg {
        from: Arc<User>,
        to: Arc<User>,
        text: String,
    },
    /// A message into a channel.
    ChanMsg {
        from: Arc<User>,
        channel: Arc<Channel>,
        text: String,
    },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Connect(..) => EventKind::Connect,
            Event::Join { .. } => EventKind::Join,
            Event::Part { .. } => EventKind::Part,
            Event::Quit { .. } => EventKind::Quit,
            Event::NewChannel(..) => EventKind::NewChannel,
            Event::EmptyChannel(..) => EventKind::EmptyChannel,
            Event::UserMsg { .. } => EventKind::UserMsg,
            Event::ChanMsg { .. } => EventKind::ChanMsg,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Connect,
    Join,
    Part,
    Quit,
    NewChannel,
    EmptyChannel,
    UserMsg,
    ChanMsg,
}

/// Fans events out to zero or more subscriber queues.
///
/// Delivery is synchronous: `publish` completes once every queue holds the
/// event, and a full queue blocks the publisher (back-pressure).  Publishes
/// are serialized, so every subscriber observes the same event order.
#[derive(Default)]
pub struct Publisher {
    subscribers: StdMutex<Vec<mpsc::Sender<Event>>>,
    /// Held across a whole publish; keeps the per-server event order total.
    order: Mutex<()>,
}

impl Publisher {
    /// Adds a queue to fan out to.  The subscription ends when the receiving
    /// half is dropped.
    pub fn subscribe(&self, queue: mpsc::Sender<Event>) {
        self.subscribers.lock().unwrap().push(queue);
    }

    /// Delivers the event to every subscribed queue.
    pub async fn publish(&self, event: Event) {
        let _order = self.order.lock().await;
        let queues = self.subscribers.lock().unwrap().clone();
        let mut any_dead = false;
        for queue in &queues {
            if queue.send(event.clone()).await.is_err() {
                any_dead = true;
            }
        }
        if any_dead {
            self.subscribers
                .lock()
                .unwrap()
                .retain(|queue| !queue.is_closed());
        }
    }

    /// Drops every subscription.
    pub fn close(&self) {
        self.subscribers.lock().unwrap().clear();
    }
}

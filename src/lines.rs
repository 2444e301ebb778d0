//! The reply texts the server puts on the wire.

pub const END_OF_NAMES: &str = "End of /NAMES list.";
pub const END_OF_WHO: &str = "End of /WHO list.";
pub const INVITE_ONLY_CHAN: &str = "Cannot join channel (+i)";
pub const NICKNAME_IN_USE: &str = "Nickname is already in use";
pub const NOT_ON_CHANNEL: &str = "You're not on that channel";
pub const NO_SUCH_CHANNEL: &str = "No such channel";
pub const NO_SUCH_NICK: &str = "No such nick/channel";
pub const NO_TOPIC: &str = "No topic is set";
pub const WELCOME: &str = "Welcome!";
pub const YOU_WILL_BE_MISSED: &str = "You will be missed.";

//! Command verbs the server consumes and produces.
//!
//! <https://tools.ietf.org/html/rfc2812.html#section-3>

pub const ERROR: &str = "ERROR";
pub const JOIN: &str = "JOIN";
pub const NAMES: &str = "NAMES";
pub const NICK: &str = "NICK";
pub const PART: &str = "PART";
pub const PING: &str = "PING";
pub const PONG: &str = "PONG";
pub const PRIVMSG: &str = "PRIVMSG";
pub const QUIT: &str = "QUIT";
pub const USER: &str = "USER";
pub const WHO: &str = "WHO";

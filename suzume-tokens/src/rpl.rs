//! The reply numerics the server sends.
//!
//! Sources:
//!
//! - <https://tools.ietf.org/html/rfc2812.html#section-5>
//! - <https://modern.ircdocs.horse/#numerics>

pub const WELCOME: &str = "001"; // <nick> :Welcome!

pub const ENDOFWHO: &str = "315"; // <nick> <mask> :End of /WHO list.
pub const NOTOPIC: &str = "331"; // <channel> :No topic is set
pub const TOPIC: &str = "332"; // <channel> :<topic>
pub const WHOREPLY: &str = "352"; // <nick> <mask> <user> <host> * <nick> H :0 <realname>
pub const NAMREPLY: &str = "353"; // <nick> = <channel> :1*(<nick> )
pub const ENDOFNAMES: &str = "366"; // <nick> [<channel>] :End of /NAMES list.

pub const ERR_NOSUCHNICK: &str = "401"; // <nick> :No such nick/channel
pub const ERR_NOSUCHCHANNEL: &str = "403"; // <channel> :No such channel
pub const ERR_NICKNAMEINUSE: &str = "433"; // <nick> :Nickname is already in use
pub const ERR_NOTONCHANNEL: &str = "442"; // <channel> :You're not on that channel
pub const ERR_NEEDMOREPARAMS: &str = "461"; // <command> :Not enough parameters
pub const ERR_INVITEONLYCHAN: &str = "473"; // :Cannot join channel (+i)

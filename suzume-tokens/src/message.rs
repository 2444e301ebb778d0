use std::fmt;

/// The origin of a message: `name[!user][@host]`.
///
/// Servers identify themselves with a bare name; users carry the full
/// `nick!user@host` triple.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Prefix {
    pub name: String,
    pub user: Option<String>,
    pub host: Option<String>,
}

impl Prefix {
    /// A server origin: just a name.
    pub fn server(name: impl Into<String>) -> Prefix {
        Prefix {
            name: name.into(),
            user: None,
            host: None,
        }
    }

    /// A user origin: `nick!user@host`.
    pub fn user(
        nick: impl Into<String>,
        user: impl Into<String>,
        host: impl Into<String>,
    ) -> Prefix {
        Prefix {
            name: nick.into(),
            user: Some(user.into()),
            host: Some(host.into()),
        }
    }

    /// Splits a prefix token.  Never fails; a token without `!` or `@` is a
    /// bare name.
    pub fn parse(s: &str) -> Prefix {
        let (rest, host) = match s.split_once('@') {
            Some((rest, host)) => (rest, Some(host)),
            None => (s, None),
        };
        let (name, user) = match rest.split_once('!') {
            Some((name, user)) => (name, Some(user)),
            None => (rest, None),
        };
        Prefix {
            name: name.to_owned(),
            user: user.map(str::to_owned),
            host: host.map(str::to_owned),
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(ref user) = self.user {
            write!(f, "!{}", user)?;
        }
        if let Some(ref host) = self.host {
            write!(f, "@{}", host)?;
        }
        Ok(())
    }
}

/// An IRC message, immutable once parsed.
///
/// The command is canonicalized to uppercase, both by [`Message::parse`] and
/// by the builder, so dispatch can match on the verbs of [`crate::cmd`]
/// directly.  The trailing parameter is kept apart from `params`: it is the
/// only parameter that may contain spaces.
///
/// ```rust
/// use suzume_tokens::{cmd, Message};
///
/// let msg = Message::parse("privmsg #chat :hello there").unwrap();
/// assert_eq!(msg.command, cmd::PRIVMSG);
/// assert_eq!(msg.params, ["#chat"]);
/// assert_eq!(msg.trailing.as_deref(), Some("hello there"));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    pub prefix: Option<Prefix>,
    pub command: String,
    pub params: Vec<String>,
    pub trailing: Option<String>,
}

/// Returns the first space-delimited word and the rest of the string.
fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(' ') {
        Some((word, rest)) => (word, rest.trim_start_matches(' ')),
        None => (s, ""),
    }
}

impl Message {
    /// Starts a message with the given command and no origin.
    pub fn new(command: impl Into<String>) -> Message {
        let mut command = command.into();
        command.make_ascii_uppercase();
        Message {
            prefix: None,
            command,
            params: Vec::new(),
            trailing: None,
        }
    }

    /// Sets the origin.
    pub fn with_prefix(mut self, prefix: Prefix) -> Message {
        self.prefix = Some(prefix);
        self
    }

    /// Appends a middle parameter.  Parameters are short tokens and must not
    /// contain spaces; free-form text goes in the trailing parameter.
    pub fn param(mut self, param: impl Into<String>) -> Message {
        self.params.push(param.into());
        self
    }

    /// Appends every item as a middle parameter.
    pub fn params<I>(mut self, params: I) -> Message
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.params.extend(params.into_iter().map(Into::into));
        self
    }

    /// Sets the trailing parameter.
    pub fn trailing(mut self, trailing: impl Into<String>) -> Message {
        self.trailing = Some(trailing.into());
        self
    }

    /// Parses one message line, without its line terminator.
    ///
    /// Returns `None` when the line holds no command: blank lines, lines of
    /// spaces, a lone prefix.  Interior NUL bytes also yield `None`.
    pub fn parse(line: &str) -> Option<Message> {
        let mut rest = line.trim_matches(|c| c == ' ' || c == '\r' || c == '\n' || c == '\t');
        if rest.is_empty() || rest.contains('\0') {
            return None;
        }

        let prefix = match rest.strip_prefix(':') {
            Some(stripped) => {
                let (token, r) = split_word(stripped);
                rest = r;
                Some(Prefix::parse(token))
            }
            None => None,
        };

        let (command, mut rest) = split_word(rest);
        if command.is_empty() {
            return None;
        }

        let mut params = Vec::new();
        let mut trailing = None;
        while !rest.is_empty() {
            if let Some(t) = rest.strip_prefix(':') {
                trailing = Some(t.to_owned());
                break;
            }
            let (word, r) = split_word(rest);
            params.push(word.to_owned());
            rest = r;
        }

        Some(Message {
            prefix,
            command: command.to_ascii_uppercase(),
            params,
            trailing,
        })
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref prefix) = self.prefix {
            write!(f, ":{} ", prefix)?;
        }
        f.write_str(&self.command)?;
        for param in &self.params {
            write!(f, " {}", param)?;
        }
        if let Some(ref trailing) = self.trailing {
            write!(f, " :{}", trailing)?;
        }
        Ok(())
    }
}

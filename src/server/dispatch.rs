//! The per-connection command loop.
//!
//! One task per registered user reads messages and turns them into registry
//! and channel operations.  Protocol errors are numerics sent back to the
//! offending client; transport errors end the loop.  Every exit path runs
//! [`Server::quit`], so the user always leaves the registry and its
//! channels, and its transport is always closed.

use std::sync::Arc;

use suzume_tokens::{cmd, rpl, CodecError, Message};

use super::Server;
use crate::event::Event;
use crate::lines;
use crate::user::User;

type HandlerResult = Result<(), CodecError>;

pub(super) async fn run(server: Server, user: Arc<User>) {
    let mut quit_reason: Option<String> = None;

    loop {
        let msg = match user.decode().await {
            Ok(msg) => msg,
            Err(err) => {
                log::debug!("{}: read failed: {}", user.nick(), err);
                break;
            }
        };

        let result = match msg.command.as_str() {
            cmd::PING => ping(&server, &user, &msg).await,
            cmd::NICK => nick(&server, &user, &msg).await,
            cmd::JOIN => join(&server, &user, &msg).await,
            cmd::PART => part(&server, &user, &msg).await,
            cmd::NAMES => names(&server, &user, &msg).await,
            cmd::WHO => who(&server, &user, &msg).await,
            cmd::PRIVMSG => privmsg(&server, &user, &msg).await,
            cmd::QUIT => {
                quit_reason = msg.trailing.clone();
                let mut echo = Message::new(cmd::QUIT).with_prefix(user.prefix());
                if let Some(ref reason) = quit_reason {
                    echo = echo.trailing(reason.clone());
                }
                let farewell = Message::new(cmd::ERROR)
                    .with_prefix(server.prefix())
                    .trailing(lines::YOU_WILL_BE_MISSED);
                let _ = user.encode(&[echo, farewell]).await;
                server
                    .publish(Event::Quit {
                        user: user.clone(),
                        reason: quit_reason.clone(),
                    })
                    .await;
                break;
            }
            // Anything else is silently ignored.
            _ => Ok(()),
        };

        if let Err(err) = result {
            log::debug!("{}: write failed: {}", user.nick(), err);
            break;
        }
    }

    server.quit(&user, quit_reason.as_deref()).await;
}

async fn need_more_params(server: &Server, user: &Arc<User>, command: &str) -> HandlerResult {
    user.encode(&[Message::new(rpl::ERR_NEEDMOREPARAMS)
        .with_prefix(server.prefix())
        .param(command)])
        .await
}

async fn ping(server: &Server, user: &Arc<User>, msg: &Message) -> HandlerResult {
    let mut pong = Message::new(cmd::PONG)
        .with_prefix(server.prefix())
        .params(msg.params.iter().cloned());
    if let Some(ref token) = msg.trailing {
        pong = pong.trailing(token.clone());
    }
    user.encode(&[pong]).await
}

async fn nick(server: &Server, user: &Arc<User>, msg: &Message) -> HandlerResult {
    if msg.params.is_empty() {
        return need_more_params(server, user, cmd::NICK).await;
    }
    server.rename_user(user, &msg.params[0]).await;
    Ok(())
}

async fn join(server: &Server, user: &Arc<User>, msg: &Message) -> HandlerResult {
    if msg.params.is_empty() {
        return need_more_params(server, user, cmd::JOIN).await;
    }
    if server.invite_only() {
        return user
            .encode(&[Message::new(rpl::ERR_INVITEONLYCHAN)
                .with_prefix(server.prefix())
                .trailing(lines::INVITE_ONLY_CHAN)])
            .await;
    }
    for name in msg.params[0].split(',') {
        if name.is_empty() {
            continue;
        }
        let channel = server.channel(name).await;
        if channel.join(user).await? {
            server
                .publish(Event::Join {
                    user: user.clone(),
                    channel,
                })
                .await;
        }
    }
    Ok(())
}

async fn part(server: &Server, user: &Arc<User>, msg: &Message) -> HandlerResult {
    if msg.params.is_empty() {
        return need_more_params(server, user, cmd::PART).await;
    }
    for name in msg.params[0].split(',') {
        if name.is_empty() {
            continue;
        }
        let Some(channel) = server.has_channel(name).await else {
            user.encode(&[Message::new(rpl::ERR_NOSUCHCHANNEL)
                .with_prefix(server.prefix())
                .param(name)
                .trailing(lines::NO_SUCH_CHANNEL)])
                .await?;
            continue;
        };
        if channel.part(user, msg.trailing.as_deref()).await {
            server
                .publish(Event::Part {
                    user: user.clone(),
                    channel,
                    reason: msg.trailing.clone(),
                })
                .await;
        }
    }
    Ok(())
}

async fn names(server: &Server, user: &Arc<User>, msg: &Message) -> HandlerResult {
    if msg.params.is_empty() {
        return need_more_params(server, user, cmd::NAMES).await;
    }
    let queried: Vec<&str> = msg.params[0].split(',').collect();
    let nick = user.nick();
    let mut replies = Vec::new();
    for name in &queried {
        let Some(channel) = server.has_channel(name).await else {
            continue;
        };
        replies.push(
            Message::new(rpl::NAMREPLY)
                .with_prefix(server.prefix())
                .param(&nick)
                .param("=")
                .param(*name)
                .trailing(channel.names().await.join(" ")),
        );
    }
    let mut end = Message::new(rpl::ENDOFNAMES)
        .with_prefix(server.prefix())
        .param(&nick);
    if queried.len() == 1 {
        end = end.param(queried[0]);
    }
    replies.push(end.trailing(lines::END_OF_NAMES));
    user.encode(&replies).await
}

async fn who(server: &Server, user: &Arc<User>, msg: &Message) -> HandlerResult {
    if msg.params.is_empty() {
        return need_more_params(server, user, cmd::WHO).await;
    }
    let mask = &msg.params[0];
    let nick = user.nick();
    let mut replies = Vec::new();
    // Only channel masks are supported; anything else gets the end marker.
    if let Some(channel) = server.has_channel(mask).await {
        for member in channel.users().await {
            let identity = member.identity();
            replies.push(
                Message::new(rpl::WHOREPLY)
                    .with_prefix(server.prefix())
                    .param(&nick)
                    .param(mask)
                    .param(&identity.user)
                    .param(&identity.host)
                    .param("*")
                    .param(&identity.nick)
                    .param("H")
                    .trailing(format!("0 {}", identity.real)),
            );
        }
    }
    replies.push(
        Message::new(rpl::ENDOFWHO)
            .with_prefix(server.prefix())
            .param(&nick)
            .param(mask)
            .trailing(lines::END_OF_WHO),
    );
    user.encode(&replies).await
}

async fn privmsg(server: &Server, user: &Arc<User>, msg: &Message) -> HandlerResult {
    if msg.params.is_empty() {
        return need_more_params(server, user, cmd::PRIVMSG).await;
    }
    let target = &msg.params[0];
    let text = msg.trailing.clone().unwrap_or_default();

    // Channels take precedence over users with the same id.
    if let Some(channel) = server.has_channel(target).await {
        channel.message(user, &text).await;
        server
            .publish(Event::ChanMsg {
                from: user.clone(),
                channel,
                text,
            })
            .await;
    } else if let Some(other) = server.has_user(target).await {
        let note = Message::new(cmd::PRIVMSG)
            .with_prefix(user.prefix())
            .param(other.nick())
            .trailing(text.clone());
        let _ = other.encode(&[note]).await;
        server
            .publish(Event::UserMsg {
                from: user.clone(),
                to: other,
                text,
            })
            .await;
    } else {
        return user
            .encode(&[Message::new(rpl::ERR_NOSUCHNICK)
                .with_prefix(server.prefix())
                .params(msg.params.iter().cloned())
                .trailing(lines::NO_SUCH_NICK)])
            .await;
    }
    Ok(())
}

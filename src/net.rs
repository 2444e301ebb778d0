//! TCP accept loop and peer host resolution.

use std::net::IpAddr;
use std::sync::OnceLock;

use tokio::net::TcpListener;
use trust_dns_resolver::TokioAsyncResolver;

use crate::server::Server;
use crate::user::User;

/// Accepts connections and runs each through the server's handshake.
///
/// Each accepted socket gets its own task, so a slow handshake never holds
/// up the accept loop.  Returns when the listener itself fails.
pub async fn listen(listener: TcpListener, server: Server) {
    loop {
        let (conn, addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(err) => {
                log::warn!("failed to accept connection: {}", err);
                return;
            }
        };
        log::debug!("{}: connected", addr);
        let server = server.clone();
        tokio::spawn(async move {
            let host = resolve_host(addr.ip()).await;
            let user = User::with_host(conn, host);
            if let Err(err) = server.connect(user).await {
                log::info!("{}: failed to register: {}", addr, err);
            }
        });
    }
}

/// Reverse-resolves a peer address, falling back to its numeric form.
pub async fn resolve_host(ip: IpAddr) -> String {
    static RESOLVER: OnceLock<Option<TokioAsyncResolver>> = OnceLock::new();
    let resolver = RESOLVER.get_or_init(|| TokioAsyncResolver::tokio_from_system_conf().ok());
    let Some(resolver) = resolver else {
        return ip.to_string();
    };
    match resolver.reverse_lookup(ip).await {
        Ok(names) => match names.iter().next() {
            Some(name) => name.to_utf8().trim_end_matches('.').to_owned(),
            None => ip.to_string(),
        },
        Err(_) => ip.to_string(),
    }
}

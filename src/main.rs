//! The suzume binary: the server engine behind a TCP listener.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process;

use clap::Parser;
use suzume::config::{self, ServerConfig};
use suzume::{net, Server};
use tokio::net::TcpListener;

#[derive(Parser)]
#[command(version, about)]
struct Opts {
    /// Path to the configuration file.
    #[arg(long, value_name = "CONFIG_FILE")]
    config: Option<PathBuf>,

    /// Bind address, overriding the configuration file.
    #[arg(long, value_name = "[HOST]:PORT")]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() {
    let opts = Opts::parse();

    let log_settings = env_logger::Env::new()
        .filter_or("SUZUME_LOG", "suzume=debug")
        .write_style("SUZUME_LOG_STYLE");
    env_logger::Builder::from_env(log_settings)
        .format(|buf, r| {
            use std::io::Write;
            writeln!(buf, "[{:<5} {}] {}", r.level(), r.target(), r.args())
        })
        .init();

    let (server_config, mut bind) = match opts.config {
        Some(ref path) => {
            let file = config::from_file(path);
            (file.server_config(), file.bind_to_address)
        }
        None => (
            ServerConfig {
                name: "suzume".to_owned(),
                ..ServerConfig::default()
            },
            SocketAddr::from(([0, 0, 0, 0], 6667)),
        ),
    };
    if let Some(addr) = opts.bind {
        bind = addr;
    }

    let listener = TcpListener::bind(bind).await.unwrap_or_else(|err| {
        log::error!("failed to bind to {}: {}", bind, err);
        process::exit(1);
    });
    log::info!("listening on {}", bind);

    net::listen(listener, Server::with_config(server_config)).await;
}

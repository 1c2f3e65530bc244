use std::net::TcpListener;
use std::os::unix::net::UnixListener;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use fdrelay_proto::transport::{Transport, TCP_HOST, TCP_PORT, UNIX_SOCKET_PATH};
use fdrelay_server::dispatch::Dispatcher;
use fdrelay_server::serve::serve;

#[derive(Parser)]
#[command(name = "fdrelayd")]
#[command(version, about = "fdrelay syscall server", long_about = None)]
struct Cli {
    /// Transport to listen on (unix|tcp); defaults to $RPC_TRANSPORT.
    #[arg(long)]
    transport: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("FDRELAY_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let transport = cli
        .transport
        .map(|s| Transport::parse(&s))
        .unwrap_or_else(Transport::from_env);

    info!(transport = transport.name(), "starting syscall server");

    let mut dispatcher = Dispatcher::new();

    // One client per server lifetime: accept once, close the listener,
    // service the connection until it goes away.
    match transport {
        Transport::Unix => {
            let _ = std::fs::remove_file(UNIX_SOCKET_PATH);
            let listener = UnixListener::bind(UNIX_SOCKET_PATH)
                .with_context(|| format!("bind {UNIX_SOCKET_PATH}"))?;
            info!(path = UNIX_SOCKET_PATH, "listening");
            let (stream, _) = listener.accept().context("accept")?;
            drop(listener);
            info!("client connected");
            serve(stream, &mut dispatcher).context("client session ended")?;
        }
        Transport::Tcp => {
            let listener = TcpListener::bind((TCP_HOST, TCP_PORT))
                .with_context(|| format!("bind {TCP_HOST}:{TCP_PORT}"))?;
            info!(host = TCP_HOST, port = TCP_PORT, "listening");
            let (stream, peer) = listener.accept().context("accept")?;
            drop(listener);
            info!(%peer, "client connected");
            serve(stream, &mut dispatcher).context("client session ended")?;
        }
    }

    Ok(())
}

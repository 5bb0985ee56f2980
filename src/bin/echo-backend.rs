//! Echo TCP backend for manual testing of the relay.
//!
//! Every chunk received is written straight back, so a relayed JSON line
//! comes back as the same JSON document.

use clap::Parser;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use http_tcp_relay::observability::logging;

#[derive(Parser, Debug)]
#[command(name = "echo-backend", about = "Echo TCP server for testing the relay", long_about = None)]
struct Cli {
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value_t = 9999)]
    port: u16,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    let listener = TcpListener::bind((cli.host.as_str(), cli.port)).await?;
    tracing::info!(address = %listener.local_addr()?, "Echo backend listening");

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (socket, peer) = accepted?;
                tracing::info!(peer = %peer, "Connected");
                tokio::spawn(async move {
                    if let Err(e) = echo(socket).await {
                        tracing::warn!(peer = %peer, error = %e, "Connection error");
                    }
                    tracing::info!(peer = %peer, "Disconnected");
                });
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Echo backend stopping");
                return Ok(());
            }
        }
    }
}

async fn echo(mut socket: TcpStream) -> std::io::Result<()> {
    let mut buf = [0u8; 1024];
    loop {
        let n = socket.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        tracing::info!(data = %String::from_utf8_lossy(&buf[..n]), "Received data");
        socket.write_all(&buf[..n]).await?;
    }
}

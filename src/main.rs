use color_eyre::eyre::{Result, WrapErr};
use mocksrv::{HttpConfig, HttpServer, MockServerTrait, WsConfig, WsServer};
use std::net::SocketAddr;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} [http|ws] [port]", program);
    eprintln!("  http|ws: Server to run (default: http)");
    eprintln!("  port:    Port to bind to (default: 8081 for http, 8080 for ws)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  {} http          # Fixed-response HTTP server on port 8081", program);
    eprintln!("  {} ws            # WebSocket echo server on port 8080", program);
    eprintln!("  {} ws 9000       # WebSocket echo server on port 9000", program);
    std::process::exit(1);
}

/// Runs a bound server until it stops on its own or Ctrl-C arrives
async fn serve<S: MockServerTrait>(server: S) -> Result<()> {
    tokio::select! {
        result = server.run() => result.wrap_err("Server failed")?,
        _ = signal::ctrl_c() => info!("Received shutdown signal, stopping server"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("mocksrv=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("mocksrv");

    let protocol = args.get(1).map(|s| s.to_lowercase()).unwrap_or_else(|| "http".to_string());
    let port = match args.get(2) {
        Some(p) => match p.parse::<u16>() {
            Ok(port) => Some(port),
            Err(_) => {
                eprintln!("Invalid port: {}", p);
                usage(program);
            }
        },
        None => None,
    };

    match protocol.as_str() {
        "http" => {
            let mut config = HttpConfig::default();
            if let Some(port) = port {
                config.bind_addr = SocketAddr::from(([0, 0, 0, 0], port));
            }
            let server = HttpServer::bind(config)
                .await
                .wrap_err("Failed to start HTTP server")?;
            serve(server).await?;
        }
        "ws" | "websocket" => {
            let mut config = WsConfig::default();
            if let Some(port) = port {
                config.bind_addr = SocketAddr::from(([0, 0, 0, 0], port));
            }
            let server = WsServer::bind(config)
                .await
                .wrap_err("Failed to start WebSocket server")?;
            serve(server).await?;
        }
        _ => usage(program),
    }

    Ok(())
}

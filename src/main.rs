mod config;
mod flow;
mod twiml;
mod webhook;

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use config::Config;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state accessible from all handlers.
///
/// Configuration is loaded once at startup and read-only for the lifetime
/// of the process; concurrent calls share nothing else.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("--version") => println!("callbox {VERSION}"),
        Some("--help") | Some("-h") => print_usage(),
        Some(other) => {
            eprintln!("Unknown option: {other}");
            print_usage();
            std::process::exit(1);
        }
        None => {
            let rt = tokio::runtime::Runtime::new().expect("Failed to create tokio runtime");
            rt.block_on(server());
        }
    }
}

fn print_usage() {
    println!("callbox {VERSION}");
    println!("Apartment callbox webhook for Twilio voice calls");
    println!();
    println!("Usage: callbox [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --version   Print version");
    println!("  --help, -h  Print this help message");
    println!();
    println!("Without options, starts the webhook server.");
}

async fn server() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "callbox=info,tower_http=info".into()),
        )
        .init();

    // Load config
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        roommates = config.callbox.roommates.len(),
        secret_menu = config.callbox.secret.is_some(),
        "Starting callbox"
    );

    let state = AppState {
        config: config.clone(),
    };

    // Build router
    let app = Router::new()
        // Twilio voice webhook; every call-flow step hits the same route
        .route("/voice", post(webhook::handle_voice))
        // Health check
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .expect("Invalid server address");

    tracing::info!(%addr, "Listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind");

    axum::serve(listener, app).await.expect("Server error");
}

async fn health() -> &'static str {
    "ok"
}

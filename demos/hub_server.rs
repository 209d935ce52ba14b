//! Event hub demo server
//!
//! Run with: cargo run --example hub_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example hub_server                    # binds to 0.0.0.0:8080
//!   cargo run --example hub_server localhost          # binds to 127.0.0.1:8080
//!   cargo run --example hub_server 127.0.0.1:9000     # binds to 127.0.0.1:9000
//!
//! ## Connecting
//!
//! Identity comes from trusted headers, as an authenticating proxy would set them:
//!
//! With websocat:
//!   websocat -H 'x-user-id: alice' ws://localhost:8080/ws
//!   websocat -H 'x-user-id: root' -H 'x-user-role: admin' ws://localhost:8080/ws
//!
//! ## What you will see
//!
//! - Every client: a `connection-status` greeting, then a `notification` every 15s
//! - Admins: a `system-stats-update` every 5s
//! - Each user: simulated `upload-progress` events for a fake upload

use std::net::SocketAddr;
use std::time::Duration;

use filehub_events::events::catalog::{NotificationKind, SystemStats};
use filehub_events::{EventPublisher, HubServer, Message, ServerConfig, TrustedHeaderAdmission};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:8080
/// - "127.0.0.1" -> 127.0.0.1:8080
/// - "127.0.0.1:9000" -> 127.0.0.1:9000
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 8080;

    let normalized = arg.replace("localhost", "127.0.0.1");

    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: hub_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:8080)");
}

/// Stand-in for the storage service: publishes a few events on timers
async fn simulate_activity(publisher: EventPublisher) {
    let mut stats_tick = tokio::time::interval(Duration::from_secs(5));
    let mut notify_tick = tokio::time::interval(Duration::from_secs(15));
    let mut upload_tick = tokio::time::interval(Duration::from_millis(500));
    let mut sent: u64 = 0;
    const TOTAL: u64 = 10 * 1024 * 1024;

    loop {
        tokio::select! {
            _ = stats_tick.tick() => {
                let hub = publisher.hub();
                let stats = SystemStats {
                    active_users: hub.connected_count() as u64,
                    total_users: hub.stats().total_connections,
                    ..Default::default()
                };
                if let Err(e) = publisher.system_stats(stats).await {
                    tracing::warn!(error = %e, "Failed to publish stats");
                }
            }
            _ = notify_tick.tick() => {
                let message = Message::notification(
                    NotificationKind::Info,
                    "Heartbeat",
                    "The demo hub is alive",
                    Some(Duration::from_secs(3)),
                );
                match publisher.send_to_all(message).await {
                    Ok(report) => tracing::debug!(delivered = report.delivered, "Notification sent"),
                    Err(e) => tracing::warn!(error = %e, "Failed to publish notification"),
                }
            }
            _ = upload_tick.tick() => {
                sent = if sent >= TOTAL { 0 } else { sent + TOTAL / 20 };
                let message = Message::upload_progress("demo-file", "demo.bin", sent, TOTAL);
                if let Err(e) = publisher.send_to_all(message).await {
                    tracing::warn!(error = %e, "Failed to publish progress");
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => SocketAddr::from(([0, 0, 0, 0], 8080)),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("filehub_events=debug".parse()?)
                .add_directive("hub_server=debug".parse()?),
        )
        .init();

    let config = ServerConfig::with_addr(bind_addr);
    println!("Starting event hub on ws://{}{}", config.bind_addr, config.path);
    println!();
    println!("websocat -H 'x-user-id: alice' ws://localhost:{}/ws", bind_addr.port());
    println!();

    let server = HubServer::new(config, TrustedHeaderAdmission::default());
    let activity = tokio::spawn(simulate_activity(server.publisher()));

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        println!("\nShutting down...");
    };
    let result = server.run_until(shutdown).await;

    activity.abort();
    let stats = server.hub().stats();
    println!(
        "Served {} connections, {} broadcasts, {} evictions",
        stats.total_connections, stats.broadcasts, stats.evictions
    );

    result?;
    Ok(())
}

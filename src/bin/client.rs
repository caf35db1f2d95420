//! Example streaming client
//!
//! Streams the default microphone to a server as RTP/UDP, with the MQTT
//! control sideband on the configured control port. Stops cleanly on
//! Ctrl+C.

use anyhow::{bail, Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voxlink::audio::list_devices;
use voxlink::{StreamConfig, VoxClient};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    let (server_ip, rtp_port) = match (args.next(), args.next()) {
        (Some(ip), Some(port)) => {
            let port: u16 = port.parse().context("rtp_port must be a number")?;
            (ip, port)
        }
        _ => bail!("usage: client <server_ip> <rtp_port>"),
    };

    println!("=== Available Audio Devices ===");
    for device in list_devices() {
        let kind = if device.is_input { "capture" } else { "playback" };
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  #{} {} ({kind}){default_marker}", device.id, device.name);
    }
    println!();

    let mut client = VoxClient::new();
    client.set_stream_config(StreamConfig {
        server_ip: server_ip.clone(),
        rtp_port,
        ..Default::default()
    })?;
    client.set_status_callback(|status| {
        println!("Status: {status}");
    });

    client
        .connect(&server_ip, rtp_port)
        .with_context(|| format!("failed to connect to {server_ip}:{rtp_port}"))?;
    client.start_stream().context("failed to start audio stream")?;

    println!("Streaming audio to {server_ip}:{rtp_port}. Press Ctrl+C to stop...");
    tokio::signal::ctrl_c().await?;
    println!("\nShutting down");

    client.stop_stream()?;
    client.disconnect()?;
    Ok(())
}

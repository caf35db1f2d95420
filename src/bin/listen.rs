//! Example receive-side monitor
//!
//! Binds a local RTP port, converts every incoming datagram to float PCM
//! and prints per-second delivery statistics until Ctrl+C. With `--play`
//! the stream is also fed to the default playback device.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use voxlink::audio::AudioDeviceAdapter;
use voxlink::constants::{DEFAULT_BUFFER_MS, DEFAULT_RTP_PORT, DEFAULT_SAMPLE_RATE};
use voxlink::net::{ReceiverFlags, RtpReceiver};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let play_audio = std::env::args().any(|arg| arg == "--play");
    let port: u16 = std::env::args()
        .skip(1)
        .find(|arg| arg != "--play")
        .map(|p| p.parse().context("port must be a number"))
        .transpose()?
        .unwrap_or(DEFAULT_RTP_PORT);

    let mut receiver = RtpReceiver::new();
    receiver
        .init("0.0.0.0", port, ReceiverFlags::ReceiveOnly)
        .with_context(|| format!("failed to bind port {port}"))?;

    let playback = if play_audio {
        match open_playback() {
            Ok(adapter) => Some(Arc::new(adapter)),
            Err(e) => {
                warn!("playback unavailable, monitoring only: {e}");
                None
            }
        }
    } else {
        None
    };

    let samples_seen = Arc::new(AtomicU64::new(0));
    let peak = Arc::new(AtomicU64::new(0));
    {
        let samples_seen = samples_seen.clone();
        let peak = peak.clone();
        let playback = playback.clone();
        receiver.set_audio_callback(move |samples| {
            samples_seen.fetch_add(samples.len() as u64, Ordering::Relaxed);
            let frame_peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
            // Peak stored in milli-units; enough resolution for a meter
            peak.fetch_max((frame_peak * 1000.0) as u64, Ordering::Relaxed);
            if let Some(adapter) = &playback {
                let _ = adapter.play(samples);
            }
        });
    }

    receiver.start().context("failed to start receiver")?;
    println!("Listening for RTP audio on 0.0.0.0:{port}. Press Ctrl+C to stop...");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                let stats = receiver.stats();
                println!(
                    "packets: {:6}  bytes: {:9}  invalid: {:3}  samples: {:8}  peak: {:.3}",
                    stats.packets_received,
                    stats.bytes_received,
                    stats.invalid_packets,
                    samples_seen.load(Ordering::Relaxed),
                    peak.swap(0, Ordering::Relaxed) as f32 / 1000.0,
                );
            }
        }
    }

    println!("\nShutting down");
    receiver.stop();
    Ok(())
}

fn open_playback() -> Result<AudioDeviceAdapter> {
    let mut adapter = AudioDeviceAdapter::new(DEFAULT_BUFFER_MS);
    adapter
        .init(-1, -1, DEFAULT_SAMPLE_RATE)
        .context("audio device init failed")?;
    adapter
        .start_playback()
        .context("no playback device available")?;
    Ok(adapter)
}

//! Client facade
//!
//! Owns the device adapter, the RTP sender and the control channel, and
//! enforces the Idle → Connected → Streaming lifecycle. While streaming, a
//! drain thread pulls the most recent 10 ms from the capture window every
//! 10 ms and submits one `send_audio` call; empty drains are forwarded as
//! no-ops so the sender can delineate talkspurts.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::audio::AudioDeviceAdapter;
use crate::config::{AudioConfig, StreamConfig};
use crate::constants::DRAIN_INTERVAL_MS;
use crate::control::ControlChannel;
use crate::error::{Error, NetworkError, Result};
use crate::net::RtpSender;

type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;
type WakeWordCallback = Arc<dyn Fn() + Send + Sync>;

/// Edge-side streaming client: connect, stream, disconnect.
pub struct VoxClient {
    audio_config: AudioConfig,
    stream_config: StreamConfig,
    adapter: AudioDeviceAdapter,
    sender: Arc<Mutex<RtpSender>>,
    control: ControlChannel,
    connected: Arc<AtomicBool>,
    streaming: Arc<AtomicBool>,
    status_callback: Arc<Mutex<Option<StatusCallback>>>,
    /// Reserved for a wake-word detector stage; registered but not yet
    /// driven by any component.
    wake_word_callback: Arc<Mutex<Option<WakeWordCallback>>>,
    drain_stop: Arc<AtomicBool>,
    drain: Option<JoinHandle<()>>,
}

impl VoxClient {
    pub fn new() -> Self {
        let audio_config = AudioConfig::default();
        let stream_config = StreamConfig::default();
        Self {
            adapter: AudioDeviceAdapter::new(audio_config.buffer_ms),
            control: ControlChannel::new(&stream_config.control_topic),
            audio_config,
            stream_config,
            sender: Arc::new(Mutex::new(RtpSender::new())),
            connected: Arc::new(AtomicBool::new(false)),
            streaming: Arc::new(AtomicBool::new(false)),
            status_callback: Arc::new(Mutex::new(None)),
            wake_word_callback: Arc::new(Mutex::new(None)),
            drain_stop: Arc::new(AtomicBool::new(false)),
            drain: None,
        }
    }

    /// Bring up the transport triple: RTP sender to `(server_ip, rtp_port)`,
    /// control channel to the configured control port, audio capture at the
    /// configured sample rate. Partially-initialized resources are torn
    /// down again if a later step fails.
    pub fn connect(&mut self, server_ip: &str, rtp_port: u16) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        self.audio_config.validate().map_err(Error::Network)?;
        self.stream_config.validate().map_err(Error::Network)?;

        if let Err(e) = self
            .sender
            .lock()
            .unwrap()
            .init(server_ip, rtp_port, self.stream_config.packet_size)
        {
            self.report_status(&format!("Connection error: {e}"));
            return Err(e.into());
        }

        self.control = ControlChannel::new(&self.stream_config.control_topic);
        let status = self.status_callback.clone();
        self.control.set_status_callback(move |message| {
            let cb = status.lock().unwrap().clone();
            if let Some(cb) = cb {
                cb(message);
            }
        });

        if let Err(e) = self
            .control
            .connect(server_ip, self.stream_config.control_port)
        {
            self.sender.lock().unwrap().stop();
            self.report_status(&format!("Connection error: {e}"));
            return Err(e.into());
        }

        self.adapter = AudioDeviceAdapter::new(self.audio_config.buffer_ms);
        if let Err(e) = self.adapter.init(-1, -1, self.audio_config.sample_rate) {
            self.control.disconnect();
            self.sender.lock().unwrap().stop();
            self.report_status(&format!("Connection error: {e}"));
            return Err(e.into());
        }

        self.connected.store(true, Ordering::SeqCst);
        info!(server_ip, rtp_port, "client connected");
        Ok(())
    }

    /// Arm the sender and open the capture tap. Idempotent while streaming.
    pub fn start_stream(&mut self) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        if self.is_streaming() {
            return Ok(());
        }

        if let Err(e) = self.sender.lock().unwrap().start() {
            self.report_status(&format!("Stream error: {e}"));
            return Err(e.into());
        }

        // Resume before clear: emptying the window requires a running
        // capture, and the clear drops whatever predates this stream
        self.adapter.resume().map_err(|e| {
            self.sender.lock().unwrap().stop();
            Error::Audio(e)
        })?;
        if let Err(e) = self.adapter.clear() {
            let _ = self.adapter.pause();
            self.sender.lock().unwrap().stop();
            return Err(e.into());
        }

        let buffer = self
            .adapter
            .capture_buffer()
            .expect("capture buffer exists after init");
        let sender = self.sender.clone();
        self.drain_stop.store(false, Ordering::SeqCst);
        let stop = self.drain_stop.clone();

        let drain = thread::Builder::new()
            .name("audio-drain".to_string())
            .spawn(move || {
                let interval = Duration::from_millis(DRAIN_INTERVAL_MS);
                let mut samples: Vec<f32> = Vec::new();
                let mut next = Instant::now() + interval;
                while !stop.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if next > now {
                        thread::sleep(next - now);
                    }
                    next += interval;
                    if next < Instant::now() {
                        // Late tick: reschedule instead of backfilling
                        next = Instant::now() + interval;
                    }
                    if stop.load(Ordering::Acquire) {
                        break;
                    }

                    if buffer.get(DRAIN_INTERVAL_MS as u32, &mut samples).is_err() {
                        continue;
                    }
                    // An empty drain still reaches the sender so the next
                    // talkspurt carries the marker bit
                    let result = sender.lock().unwrap().send_audio(&samples);
                    match result {
                        Ok(()) => {}
                        Err(NetworkError::NotRunning) => {}
                        Err(e) => warn!("drain send failed: {e}"),
                    }
                }
                debug!("drain loop finished");
            })
            .map_err(|e| Error::Audio(crate::error::AudioError::Stream(e.to_string())))?;

        self.drain = Some(drain);
        self.streaming.store(true, Ordering::SeqCst);
        info!("streaming started");
        Ok(())
    }

    /// Pause capture and tear the sender down. No-op unless streaming. The
    /// drain thread is joined first, so an in-flight send finishes before
    /// the sender closes.
    pub fn stop_stream(&mut self) -> Result<()> {
        if !self.is_streaming() {
            return Ok(());
        }
        self.streaming.store(false, Ordering::SeqCst);

        self.drain_stop.store(true, Ordering::SeqCst);
        if let Some(drain) = self.drain.take() {
            let _ = drain.join();
        }

        if let Err(e) = self.adapter.pause() {
            warn!("pause on stop_stream failed: {e}");
        }
        self.sender.lock().unwrap().stop();
        info!("streaming stopped");
        Ok(())
    }

    /// Stop streaming if needed, close the control channel and the audio
    /// device, and return to Idle. No-op when already Idle.
    pub fn disconnect(&mut self) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }
        if self.is_streaming() {
            self.stop_stream()?;
        }
        self.control.disconnect();
        self.adapter.close();
        self.connected.store(false, Ordering::SeqCst);
        info!("client disconnected");
        Ok(())
    }

    /// Replace the audio configuration. Rejected while streaming.
    pub fn set_audio_config(&mut self, config: AudioConfig) -> Result<()> {
        if self.is_streaming() {
            return Err(Error::Busy("audio config cannot change while streaming"));
        }
        self.audio_config = config;
        Ok(())
    }

    /// Replace the stream configuration. Rejected once connected.
    pub fn set_stream_config(&mut self, config: StreamConfig) -> Result<()> {
        if self.is_connected() || self.is_streaming() {
            return Err(Error::Busy("stream config cannot change while connected"));
        }
        self.stream_config = config;
        Ok(())
    }

    /// Register the status callback; control-channel messages and facade
    /// errors are delivered through it, from a network thread.
    pub fn set_status_callback<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.status_callback.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Register the wake-word callback. The hook is reserved; nothing
    /// invokes it until a detector stage exists.
    pub fn set_wake_word_callback<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.wake_word_callback.lock().unwrap() = Some(Arc::new(callback));
    }

    /// Publish a command string over the control channel.
    pub fn send_command(&self, command: &str) -> Result<()> {
        self.control.send_command(command).map_err(Error::from)
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::SeqCst)
    }

    fn report_status(&self, message: &str) {
        let cb = self.status_callback.lock().unwrap().clone();
        if let Some(cb) = cb {
            cb(message);
        }
    }
}

impl Default for VoxClient {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for VoxClient {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_initial_state_is_idle() {
        let client = VoxClient::new();
        assert!(!client.is_connected());
        assert!(!client.is_streaming());
    }

    #[test]
    fn test_stream_operations_require_connection() {
        let mut client = VoxClient::new();
        assert!(matches!(client.start_stream(), Err(Error::NotConnected)));
        assert!(client.stop_stream().is_ok());
        assert!(client.disconnect().is_ok());
        assert!(client.send_command("ping").is_err());
    }

    #[test]
    fn test_config_mutation_allowed_while_idle() {
        let mut client = VoxClient::new();
        assert!(client.set_audio_config(AudioConfig::default()).is_ok());
        assert!(client.set_stream_config(StreamConfig::default()).is_ok());
    }

    #[test]
    fn test_connect_rejects_bad_host_and_stays_idle() {
        let mut client = VoxClient::new();
        let (tx, rx) = unbounded::<String>();
        client.set_status_callback(move |status| {
            let _ = tx.send(status.to_string());
        });

        assert!(client.connect("definitely-not-an-ip", 5004).is_err());
        assert!(!client.is_connected());

        let status = rx.try_recv().expect("failure surfaces as a status");
        assert!(status.starts_with("Connection error:"), "got: {status}");
    }

    #[test]
    fn test_callback_registration() {
        let client = VoxClient::new();
        client.set_status_callback(|_| {});
        client.set_wake_word_callback(|| {});
        // Replacement is the contract; the latest registration wins
        let (tx, rx) = unbounded::<String>();
        client.set_status_callback(move |status| {
            let _ = tx.send(status.to_string());
        });
        client.report_status("probe");
        assert_eq!(rx.try_recv().unwrap(), "probe");
    }

    #[test]
    fn test_connect_rejects_invalid_config() {
        let mut client = VoxClient::new();
        client
            .set_stream_config(StreamConfig {
                packet_size: 0,
                ..Default::default()
            })
            .unwrap();
        assert!(client.connect("127.0.0.1", 5004).is_err());
        assert!(!client.is_connected());
    }
}

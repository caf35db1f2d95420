//! Capture and playback device adapter
//!
//! Opens a capture stream (and optionally a playback stream) on the audio
//! host and routes the realtime callbacks: capture pushes into the circular
//! window buffer, playback drains a FIFO and zero-fills underruns.
//!
//! cpal streams are not `Send`, so a dedicated worker thread owns them and
//! services pause/resume commands over a channel; the buffers themselves are
//! shared and read from the application side without involving the worker.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, StreamTrait};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::audio::buffer::CircularAudioBuffer;
use crate::audio::device;
use crate::constants::FRAMES_PER_BUFFER;
use crate::error::AudioError;

enum DeviceCmd {
    Resume,
    Pause,
    StartPlayback,
    StopPlayback,
    Close,
}

type PlaybackQueue = Arc<Mutex<VecDeque<f32>>>;

/// Capture + optional playback lifecycle over the audio host.
pub struct AudioDeviceAdapter {
    window_ms: u32,
    sample_rate: u32,
    capture: Option<Arc<CircularAudioBuffer>>,
    playback: PlaybackQueue,
    has_playback: bool,
    running: Arc<AtomicBool>,
    playing: Arc<AtomicBool>,
    cmd_tx: Option<Sender<DeviceCmd>>,
    worker: Option<JoinHandle<()>>,
    error_rx: Option<Receiver<AudioError>>,
}

impl AudioDeviceAdapter {
    /// Create an adapter retaining the most recent `window_ms` of capture.
    pub fn new(window_ms: u32) -> Self {
        Self {
            window_ms,
            sample_rate: 0,
            capture: None,
            playback: Arc::new(Mutex::new(VecDeque::new())),
            has_playback: false,
            running: Arc::new(AtomicBool::new(false)),
            playing: Arc::new(AtomicBool::new(false)),
            cmd_tx: None,
            worker: None,
            error_rx: None,
        }
    }

    /// Open devices and build paused streams at `sample_rate`, mono f32,
    /// 1024-frame buffers.
    ///
    /// A negative id selects the system default. Capture is mandatory; an
    /// explicitly-requested playback id is mandatory, a default playback
    /// device is opened best-effort. On failure every already-opened stream
    /// is closed before the error is returned.
    pub fn init(
        &mut self,
        capture_id: i32,
        playback_id: i32,
        sample_rate: u32,
    ) -> Result<(), AudioError> {
        if self.worker.is_some() {
            self.close();
        }

        let buffer = Arc::new(CircularAudioBuffer::new(sample_rate, self.window_ms));
        let stream_config = cpal::StreamConfig {
            channels: 1,
            sample_rate: cpal::SampleRate(sample_rate),
            buffer_size: cpal::BufferSize::Fixed(FRAMES_PER_BUFFER),
        };

        let (cmd_tx, cmd_rx) = unbounded::<DeviceCmd>();
        let (ack_tx, ack_rx) = bounded::<Result<bool, AudioError>>(1);
        let (err_tx, err_rx) = bounded::<AudioError>(16);

        let running = self.running.clone();
        let cb_buffer = buffer.clone();
        let cb_playback = self.playback.clone();

        let worker = thread::Builder::new()
            .name("audio-device".to_string())
            .spawn(move || {
                let capture_err_tx = err_tx.clone();
                let capture_stream = device::capture_device(capture_id).and_then(|dev| {
                    let running = running.clone();
                    dev.build_input_stream(
                        &stream_config,
                        move |data: &[f32], _: &cpal::InputCallbackInfo| {
                            if !running.load(Ordering::Relaxed) {
                                return;
                            }
                            let _ = cb_buffer.push(data);
                        },
                        move |e| {
                            let _ = capture_err_tx.try_send(AudioError::Stream(e.to_string()));
                        },
                        None,
                    )
                    .map_err(|e| AudioError::DeviceOpen(e.to_string()))
                });

                let capture_stream = match capture_stream {
                    Ok(s) => s,
                    Err(e) => {
                        let _ = ack_tx.send(Err(e));
                        return;
                    }
                };

                let playback_err_tx = err_tx.clone();
                let playback_stream = device::playback_device(playback_id).and_then(|dev| {
                    dev.build_output_stream(
                        &stream_config,
                        move |out: &mut [f32], _: &cpal::OutputCallbackInfo| {
                            let mut queue = cb_playback.lock().unwrap();
                            let available = queue.len().min(out.len());
                            for slot in out.iter_mut().take(available) {
                                *slot = queue.pop_front().unwrap_or(0.0);
                            }
                            // Underrun: emit silence for the deficit
                            for slot in out.iter_mut().skip(available) {
                                *slot = 0.0;
                            }
                        },
                        move |e| {
                            let _ = playback_err_tx.try_send(AudioError::Stream(e.to_string()));
                        },
                        None,
                    )
                    .map_err(|e| AudioError::DeviceOpen(e.to_string()))
                });

                let playback_stream = match playback_stream {
                    Ok(s) => Some(s),
                    // Explicitly-requested playback must open; dropping
                    // capture_stream here closes it before we report back
                    Err(e) if playback_id >= 0 => {
                        let _ = ack_tx.send(Err(e));
                        return;
                    }
                    Err(e) => {
                        debug!("default playback unavailable: {e}");
                        None
                    }
                };

                // Streams start paused; resume() opens the tap
                let _ = capture_stream.pause();
                if let Some(s) = &playback_stream {
                    let _ = s.pause();
                }

                let _ = ack_tx.send(Ok(playback_stream.is_some()));

                while let Ok(cmd) = cmd_rx.recv() {
                    match cmd {
                        DeviceCmd::Resume => {
                            if let Err(e) = capture_stream.play() {
                                let _ = err_tx.try_send(AudioError::Stream(e.to_string()));
                            }
                            if let Some(s) = &playback_stream {
                                let _ = s.play();
                            }
                        }
                        DeviceCmd::Pause => {
                            let _ = capture_stream.pause();
                            if let Some(s) = &playback_stream {
                                let _ = s.pause();
                            }
                        }
                        DeviceCmd::StartPlayback => {
                            if let Some(s) = &playback_stream {
                                let _ = s.play();
                            }
                        }
                        DeviceCmd::StopPlayback => {
                            if let Some(s) = &playback_stream {
                                let _ = s.pause();
                            }
                        }
                        DeviceCmd::Close => break,
                    }
                }
                // Streams drop here, closing the devices
            })
            .map_err(|e| AudioError::DeviceOpen(e.to_string()))?;

        let has_playback = match ack_rx.recv() {
            Ok(Ok(has_playback)) => has_playback,
            Ok(Err(e)) => {
                let _ = worker.join();
                return Err(e);
            }
            Err(_) => {
                let _ = worker.join();
                return Err(AudioError::DeviceOpen("audio worker died during init".into()));
            }
        };

        self.sample_rate = sample_rate;
        self.capture = Some(buffer);
        self.has_playback = has_playback;
        self.cmd_tx = Some(cmd_tx);
        self.worker = Some(worker);
        self.error_rx = Some(err_rx);
        debug!(sample_rate, has_playback, "audio device initialized");
        Ok(())
    }

    /// Start the audio streams. Idempotent.
    pub fn resume(&mut self) -> Result<(), AudioError> {
        let tx = self.cmd_tx.as_ref().ok_or(AudioError::NotInitialized)?;
        tx.send(DeviceCmd::Resume)
            .map_err(|_| AudioError::Stream("audio worker is gone".into()))?;
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop the audio streams. Idempotent.
    pub fn pause(&mut self) -> Result<(), AudioError> {
        let tx = self.cmd_tx.as_ref().ok_or(AudioError::NotInitialized)?;
        tx.send(DeviceCmd::Pause)
            .map_err(|_| AudioError::Stream("audio worker is gone".into()))?;
        self.running.store(false, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Empty the capture window.
    pub fn clear(&self) -> Result<(), AudioError> {
        if !self.running.load(Ordering::SeqCst) {
            return Err(AudioError::NotRunning);
        }
        match &self.capture {
            Some(buffer) => buffer.clear(),
            None => Err(AudioError::NoDevice),
        }
    }

    /// Copy the most recent `ms` of capture into `out`, oldest first.
    pub fn get(&self, ms: u32, out: &mut Vec<f32>) -> Result<(), AudioError> {
        match &self.capture {
            Some(buffer) => buffer.get(ms, out),
            None => Err(AudioError::NoDevice),
        }
    }

    /// Queue samples for playback.
    ///
    /// The FIFO is unbounded; callers pace their submissions against the
    /// playback rate.
    pub fn play(&self, samples: &[f32]) -> Result<(), AudioError> {
        if !self.has_playback {
            return Err(AudioError::NoDevice);
        }
        let mut queue = self.playback.lock().unwrap();
        queue.extend(samples.iter().copied());
        Ok(())
    }

    /// Start the playback stream without touching capture.
    pub fn start_playback(&mut self) -> Result<(), AudioError> {
        if !self.has_playback {
            return Err(AudioError::NoDevice);
        }
        let tx = self.cmd_tx.as_ref().ok_or(AudioError::NotInitialized)?;
        tx.send(DeviceCmd::StartPlayback)
            .map_err(|_| AudioError::Stream("audio worker is gone".into()))?;
        self.playing.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// Stop the playback stream without touching capture.
    pub fn stop_playback(&mut self) -> Result<(), AudioError> {
        if !self.has_playback {
            return Err(AudioError::NoDevice);
        }
        let tx = self.cmd_tx.as_ref().ok_or(AudioError::NotInitialized)?;
        tx.send(DeviceCmd::StopPlayback)
            .map_err(|_| AudioError::Stream("audio worker is gone".into()))?;
        self.playing.store(false, Ordering::SeqCst);
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    /// Sample rate obtained at init; 0 before init.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Shared handle to the capture window, if capture was opened.
    pub fn capture_buffer(&self) -> Option<Arc<CircularAudioBuffer>> {
        self.capture.clone()
    }

    /// Drain one pending stream error, if any.
    pub fn take_error(&self) -> Option<AudioError> {
        self.error_rx.as_ref().and_then(|rx| rx.try_recv().ok())
    }

    /// Close the devices and join the worker. Idempotent.
    pub fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.playing.store(false, Ordering::SeqCst);
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(DeviceCmd::Close);
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("audio worker panicked during close");
            }
        }
        self.capture = None;
        self.has_playback = false;
        self.error_rx = None;
    }
}

impl Drop for AudioDeviceAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

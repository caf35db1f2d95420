//! MQTT control sideband
//!
//! Publishes command strings and forwards every payload received on the
//! status topic to the registered callback, in broker delivery order. The
//! notification loop runs on its own thread, mirroring the transport's
//! role as a low-rate sideband next to the RTP stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::bounded;
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use tracing::{debug, warn};

use crate::constants::COMMAND_TOPIC;
use crate::error::ControlError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const RETRY_DELAY: Duration = Duration::from_secs(1);

type StatusCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Pub/sub control client for server status and commands.
pub struct ControlChannel {
    status_topic: String,
    client: Option<Client>,
    connected: Arc<AtomicBool>,
    running: Arc<AtomicBool>,
    callback: Arc<Mutex<Option<StatusCallback>>>,
    worker: Option<JoinHandle<()>>,
}

impl ControlChannel {
    pub fn new(status_topic: &str) -> Self {
        Self {
            status_topic: status_topic.to_string(),
            client: None,
            connected: Arc::new(AtomicBool::new(false)),
            running: Arc::new(AtomicBool::new(false)),
            callback: Arc::new(Mutex::new(None)),
            worker: None,
        }
    }

    /// Connect to the broker and subscribe to the status topic.
    ///
    /// Blocks until the broker acknowledges the session (or the attempt
    /// fails). A successful connect is itself surfaced through the status
    /// callback as a "Connected" message.
    pub fn connect(&mut self, host: &str, port: u16) -> Result<(), ControlError> {
        if self.is_connected() {
            return Ok(());
        }
        self.disconnect();

        let client_id = format!("voxlink-{:08x}", rand::random::<u32>());
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(60));

        let (client, mut connection) = Client::new(options, 16);

        let (ack_tx, ack_rx) = bounded::<Result<(), String>>(1);
        let connected = self.connected.clone();
        let running = self.running.clone();
        let callback = self.callback.clone();
        let status_topic = self.status_topic.clone();
        let loop_client = client.clone();

        self.running.store(true, Ordering::SeqCst);

        let worker = thread::Builder::new()
            .name("control-channel".to_string())
            .spawn(move || {
                let mut session_up = false;
                for event in connection.iter() {
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    match event {
                        Ok(Event::Incoming(Packet::ConnAck(_))) => {
                            connected.store(true, Ordering::SeqCst);
                            if let Err(e) =
                                loop_client.subscribe(status_topic.as_str(), QoS::AtMostOnce)
                            {
                                warn!("status subscribe failed: {e}");
                            }
                            if !session_up {
                                session_up = true;
                                let _ = ack_tx.try_send(Ok(()));
                            }
                            emit(&callback, "Connected to control broker");
                        }
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            let text = String::from_utf8_lossy(&publish.payload);
                            emit(&callback, &text);
                        }
                        Ok(Event::Incoming(Packet::Disconnect)) => {
                            connected.store(false, Ordering::SeqCst);
                        }
                        Ok(_) => {}
                        Err(e) => {
                            connected.store(false, Ordering::SeqCst);
                            if !session_up {
                                // Initial connect failed; report and give up
                                let _ = ack_tx.try_send(Err(e.to_string()));
                                break;
                            }
                            if !running.load(Ordering::SeqCst) {
                                break;
                            }
                            warn!("control connection lost: {e}");
                            thread::sleep(RETRY_DELAY);
                        }
                    }
                }
                connected.store(false, Ordering::SeqCst);
                debug!("control loop finished");
            })
            .map_err(|e| ControlError::ConnectFailed(e.to_string()))?;

        self.worker = Some(worker);
        self.client = Some(client);

        match ack_rx.recv_timeout(CONNECT_TIMEOUT) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.disconnect();
                Err(ControlError::ConnectFailed(e))
            }
            Err(_) => {
                self.disconnect();
                Err(ControlError::ConnectFailed("broker handshake timed out".into()))
            }
        }
    }

    /// Publish a command string on the command topic.
    pub fn send_command(&self, command: &str) -> Result<(), ControlError> {
        if !self.is_connected() {
            return Err(ControlError::NotConnected);
        }
        let client = self.client.as_ref().ok_or(ControlError::NotConnected)?;
        client
            .publish(COMMAND_TOPIC, QoS::AtMostOnce, false, command.as_bytes())
            .map_err(|e| ControlError::PublishFailed(e.to_string()))
    }

    /// Atomically replace the status callback; the next forwarded message
    /// observes the replacement.
    pub fn set_status_callback<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        *self.callback.lock().unwrap() = Some(Arc::new(callback));
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Drop the broker session and join the notification loop. Idempotent.
    pub fn disconnect(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(client) = self.client.take() {
            let _ = client.disconnect();
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        self.connected.store(false, Ordering::SeqCst);
    }
}

fn emit(callback: &Arc<Mutex<Option<StatusCallback>>>, status: &str) {
    let cb = callback.lock().unwrap().clone();
    if let Some(cb) = cb {
        cb(status);
    }
}

impl Drop for ControlChannel {
    fn drop(&mut self) {
        self.disconnect();
    }
}

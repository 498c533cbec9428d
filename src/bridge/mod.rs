//! # Bridge Engine
//!
//! The heart of the daemon: one owned session that translates client
//! datagrams into keyer commands and keyer status back into flow control and
//! client echoes.
//!
//! ## Event Loop
//!
//! [`Bridge::run`] executes a fixed sequence every iteration:
//!
//! 1. Poll the UDP socket, bounded to 50 ms (the loop's only deliberate
//!    block); parse and apply any datagram.
//! 2. Check the tune deadline and release the carrier when it expires.
//! 3. If flow control allows, pop and transmit at most one queued unit.
//! 4. Read at most one status byte from the keyer and apply it.
//!
//! The ordering is load-bearing: a stop command must flush the queue before
//! any further dequeue, and control commands must reach the keyer before the
//! next status sample. Everything is owned by the single loop task, so there
//! is no locking anywhere.
//!
//! ## Clients
//!
//! Every datagram source is remembered in a grow-only peer set (first
//! contact is logged); echoed characters are broadcast to all of them. Peers
//! are never evicted, so a very long-lived daemon visited by many transient
//! clients will grow this set without bound.

use std::collections::{HashSet, VecDeque};
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, info, trace, warn};
use tokio::net::UdpSocket;
use tokio::time::{timeout, Instant};

use crate::config::Config;
use crate::keyer::status::{self, StatusFrame};
use crate::keyer::{commands, KeyerDevice};
use crate::logutil::preview;

pub mod command;
pub mod encode;

use command::{parse_datagram, ClientCommand};
use encode::{OutgoingUnit, TextEncoder};

/// Network poll bound; also the pacing of queued-unit transmission.
const POLL_INTERVAL: Duration = Duration::from_millis(50);
/// Hard per-peer bound on an echo datagram send.
const ECHO_SEND_TIMEOUT: Duration = Duration::from_secs(1);

/// Mutable keyer-session state. The busy/xoff/tune flags are deliberately
/// independent booleans, not a single enum: the keyer reports them in
/// arbitrary combinations (busy while its buffer fills, tuning while busy).
#[derive(Debug)]
pub struct KeyerState {
    /// Current keying speed in WPM. Mutated by the speed command and by
    /// inline `+`/`-` nudges.
    pub speed: u8,
    /// Keyer buffer is 2/3 full; queued transmission pauses while set.
    pub xoff: bool,
    /// Keyer is sending.
    pub busy: bool,
    /// A timed tune (continuous carrier) is active.
    pub tune_on: bool,
    /// Absolute expiry of the active tune window. Only meaningful while
    /// `tune_on` is set.
    pub tune_deadline: Instant,
    /// Weighting as sent to the keyer, 10..=90.
    pub weight: u8,
    /// PTT lead-in in milliseconds, 0..=50.
    pub ptt_lead_in: u8,
}

impl KeyerState {
    fn from_config(config: &Config) -> Self {
        KeyerState {
            speed: config.cw.speed,
            xoff: false,
            busy: false,
            tune_on: false,
            tune_deadline: Instant::now(),
            weight: config.cw.weight.clamp(10, 90),
            ptt_lead_in: config.cw.ptt_lead_in_ms.min(50),
        }
    }
}

/// Outcome of one handled input: keep looping or wind the daemon down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    Continue,
    Shutdown,
}

/// The daemon session: configuration snapshot, UDP socket, keyer link, the
/// outgoing queue, and all mutable state. Owned exclusively by the event
/// loop task.
pub struct Bridge {
    config: Config,
    socket: UdpSocket,
    device: Option<KeyerDevice>,
    state: KeyerState,
    queue: VecDeque<OutgoingUnit>,
    encoder: TextEncoder,
    peers: HashSet<SocketAddr>,
}

impl Bridge {
    /// Bind the UDP endpoint and build the session. The keyer is attached
    /// separately via [`Bridge::connect_device`].
    pub async fn new(config: Config) -> Result<Self> {
        let bind_addr = config.network.bind_addr();
        let socket = UdpSocket::bind(&bind_addr)
            .await
            .with_context(|| format!("Failed to bind UDP socket on {bind_addr}"))?;
        info!("Listening on udp://{}", socket.local_addr()?);
        let state = KeyerState::from_config(&config);
        Ok(Bridge {
            config,
            socket,
            device: None,
            state,
            queue: VecDeque::new(),
            encoder: TextEncoder::new(),
            peers: HashSet::new(),
        })
    }

    /// Open the serial keyer and run the session bring-up sequence. A CLI
    /// device path overrides the configured one. Failure here is fatal for
    /// the daemon: there is nothing to bridge without the keyer.
    pub fn connect_device(&mut self, override_path: Option<&str>) -> Result<()> {
        let device_path = override_path.unwrap_or(&self.config.keyer.device).to_string();
        let mut device = KeyerDevice::open(&device_path, self.config.keyer.baud_rate)?;
        device.initialize(&self.config.cw)?;
        info!("Connected to keyer on {}", device_path);
        self.device = Some(device);
        Ok(())
    }

    /// Attach an already-open keyer device. Test seam for running the bridge
    /// against a scripted port.
    pub fn attach_device(&mut self, device: KeyerDevice) {
        self.device = Some(device);
    }

    fn device_mut(&mut self) -> Result<&mut KeyerDevice> {
        self.device
            .as_mut()
            .ok_or_else(|| anyhow!("keyer device not connected"))
    }

    /// Current session state (read-only).
    pub fn state(&self) -> &KeyerState {
        &self.state
    }

    /// Units currently awaiting transmission.
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    /// Distinct client addresses seen so far.
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// Main loop. Runs until a terminate command, Ctrl-C, or a fatal
    /// transport error; closes the keyer host interface on the way out.
    pub async fn run(&mut self) -> Result<()> {
        if self.device.is_none() {
            return Err(anyhow!("cannot run bridge without a connected keyer"));
        }
        info!(
            "Bridge running: {} WPM, echo {}",
            self.state.speed,
            if self.config.cw.echo { "on" } else { "off" }
        );

        let mut buf = [0u8; 512];
        loop {
            let action = tokio::select! {
                recv = timeout(POLL_INTERVAL, self.socket.recv_from(&mut buf)) => {
                    match recv {
                        Ok(Ok((len, from))) => {
                            let datagram = buf[..len].to_vec();
                            self.handle_datagram(&datagram, from)?
                        }
                        Ok(Err(e)) => return Err(e).context("UDP receive failed"),
                        // Poll window elapsed with no datagram
                        Err(_) => LoopControl::Continue,
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Received shutdown signal");
                    LoopControl::Shutdown
                }
            };
            if action == LoopControl::Shutdown {
                break;
            }

            self.check_tune(Instant::now())?;
            self.pump_queue()?;
            self.poll_status().await?;
        }

        if let Some(ref mut device) = self.device {
            device.close()?;
        }
        info!("Bridge stopped");
        Ok(())
    }

    /// Register the sender and apply one datagram. Registration happens for
    /// every datagram, including empty or malformed ones, so echo can reach
    /// clients that have only ever listened after a first probe packet.
    pub fn handle_datagram(&mut self, data: &[u8], from: SocketAddr) -> Result<LoopControl> {
        if self.peers.insert(from) {
            info!("New client {}", from);
        }
        let Some(cmd) = parse_datagram(data) else {
            trace!("Empty datagram from {}", from);
            return Ok(LoopControl::Continue);
        };
        self.apply_command(cmd)
    }

    fn apply_command(&mut self, cmd: ClientCommand) -> Result<LoopControl> {
        match cmd {
            ClientCommand::Text(payload) => {
                debug!("Text from client: \"{}\"", preview(&payload));
                let units = self.encoder.encode(&payload, &mut self.state.speed);
                self.queue.extend(units);
            }
            ClientCommand::SetSpeed(arg) => {
                let wpm = command::speed_byte(arg);
                self.state.speed = wpm;
                if wpm != 0
                    && !(self.config.cw.min_speed..=self.config.cw.max_speed).contains(&wpm)
                {
                    warn!(
                        "Requested speed {} WPM outside pot range {}-{}; sending anyway",
                        wpm, self.config.cw.min_speed, self.config.cw.max_speed
                    );
                }
                debug!("Speed set to {} WPM", wpm);
                self.device_mut()?.send(&commands::cmd_set_speed(wpm))?;
            }
            ClientCommand::SetWeight(arg) => {
                let weight = command::weight_byte(arg);
                self.state.weight = weight;
                debug!("Weight set to {}", weight);
                self.device_mut()?.send(&commands::cmd_set_weight(weight))?;
            }
            ClientCommand::SetPttLeadIn(arg) => {
                let lead_ms = command::ptt_lead_ms(arg);
                self.state.ptt_lead_in = lead_ms;
                debug!("PTT lead-in set to {} ms", lead_ms);
                self.device_mut()?
                    .send(&commands::cmd_set_ptt_timing(lead_ms / 10, 0))?;
            }
            ClientCommand::Tune(arg) => {
                if arg > 0 {
                    let secs = command::tune_seconds(arg);
                    self.state.tune_on = true;
                    self.state.tune_deadline = Instant::now() + Duration::from_secs(secs);
                    info!("Tune on for {} s", secs);
                    self.device_mut()?.send(&commands::cmd_tune(true))?;
                }
            }
            ClientCommand::StopKeying => {
                debug!("Stop keying, flushing {} queued units", self.queue.len());
                self.device_mut()?.send(&commands::cmd_stop())?;
                self.queue.clear();
                // The stop command aborts any running tune on the hardware;
                // no separate tune-off write.
                self.state.tune_on = false;
            }
            ClientCommand::Terminate => {
                info!("Terminate requested by client");
                return Ok(LoopControl::Shutdown);
            }
        }
        Ok(LoopControl::Continue)
    }

    /// Release the tune carrier once its deadline passes. The tune-off write
    /// bypasses the queue: it is a control command, not buffered data.
    pub fn check_tune(&mut self, now: Instant) -> Result<()> {
        if self.state.tune_on && now >= self.state.tune_deadline {
            self.state.tune_on = false;
            self.device_mut()?.send(&commands::cmd_tune(false))?;
            info!("Tune window expired, carrier released");
        }
        Ok(())
    }

    /// Transmit at most one queued unit, gated by flow control. One unit per
    /// 50 ms iteration matches the keyer's own pacing and keeps its small
    /// buffer from overrunning.
    pub fn pump_queue(&mut self) -> Result<()> {
        if self.state.xoff {
            return Ok(());
        }
        if let Some(unit) = self.queue.pop_front() {
            trace!("TX unit: {}", preview(&unit));
            self.device_mut()?.send(&unit)?;
        }
        Ok(())
    }

    /// Read at most one status byte and apply it.
    pub async fn poll_status(&mut self) -> Result<()> {
        let byte = match self.device_mut()?.poll_status()? {
            Some(b) => b,
            None => return Ok(()),
        };
        self.apply_status(byte).await;
        Ok(())
    }

    /// Apply one decoded status byte to session state, broadcasting echoed
    /// printable characters when echo mode is on.
    pub async fn apply_status(&mut self, byte: u8) {
        let frame = status::classify(byte);
        match frame {
            StatusFrame::Status {
                xoff,
                break_in,
                busy,
                tuning,
                waiting,
            } => {
                if xoff != self.state.xoff {
                    debug!("Flow control: xoff {}", if xoff { "set" } else { "cleared" });
                }
                self.state.xoff = xoff;
                if frame.is_idle() {
                    if self.state.busy {
                        debug!("Keyer idle");
                    }
                    self.state.busy = false;
                } else {
                    if busy && !self.state.busy {
                        debug!("Keyer busy");
                    }
                    if busy {
                        self.state.busy = true;
                    }
                    if break_in {
                        trace!("Paddle break-in");
                    }
                    if tuning {
                        trace!("Keyer reports tuning");
                    }
                    if waiting {
                        trace!("Keyer waiting");
                    }
                }
            }
            StatusFrame::PotReading(value) => {
                trace!("Speed pot reading: {}", value);
            }
            StatusFrame::Echo(c) => {
                if self.config.cw.echo && status::is_printable_echo(c) {
                    self.broadcast_echo(c).await;
                }
            }
        }
    }

    /// Send one echoed character to every known peer. Each send is bounded
    /// by its own timeout; a slow or dead peer never blocks the rest.
    pub async fn broadcast_echo(&self, byte: u8) {
        for peer in &self.peers {
            match timeout(ECHO_SEND_TIMEOUT, self.socket.send_to(&[byte], *peer)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => warn!("Echo send to {} failed: {}", peer, e),
                Err(_) => warn!("Echo send to {} timed out", peer),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn test_config() -> Config {
        let mut config = Config::default();
        config.network.bind = "127.0.0.1".to_string();
        config.network.port = 0;
        config
    }

    fn addr(port: u16) -> SocketAddr {
        format!("127.0.0.1:{port}").parse().unwrap()
    }

    #[test]
    fn text_datagram_enqueues_without_device() {
        tokio_test::block_on(async {
            let mut bridge = Bridge::new(test_config()).await.unwrap();
            let action = bridge.handle_datagram(b"CQ", addr(40001)).unwrap();
            assert_eq!(action, LoopControl::Continue);
            assert_eq!(bridge.queue_len(), 2);
        });
    }

    #[test]
    fn peers_register_once_even_for_empty_datagrams() {
        tokio_test::block_on(async {
            let mut bridge = Bridge::new(test_config()).await.unwrap();
            bridge.handle_datagram(b"", addr(40002)).unwrap();
            bridge.handle_datagram(b"", addr(40002)).unwrap();
            bridge.handle_datagram(b"", addr(40003)).unwrap();
            assert_eq!(bridge.peer_count(), 2);
        });
    }

    #[test]
    fn terminate_requests_shutdown() {
        tokio_test::block_on(async {
            let mut bridge = Bridge::new(test_config()).await.unwrap();
            let action = bridge.handle_datagram(b"\x1b5", addr(40004)).unwrap();
            assert_eq!(action, LoopControl::Shutdown);
        });
    }

    #[test]
    fn status_frames_drive_flow_control_flags() {
        tokio_test::block_on(async {
            let mut bridge = Bridge::new(test_config()).await.unwrap();
            bridge.apply_status(0xC5).await; // busy + buffer 2/3 full
            assert!(bridge.state().busy);
            assert!(bridge.state().xoff);
            bridge.apply_status(0xC4).await; // still busy, buffer drained
            assert!(bridge.state().busy);
            assert!(!bridge.state().xoff);
            bridge.apply_status(0xC0).await; // idle
            assert!(!bridge.state().busy);
            assert!(!bridge.state().xoff);
        });
    }

    #[test]
    fn busy_persists_until_exact_idle_frame() {
        tokio_test::block_on(async {
            let mut bridge = Bridge::new(test_config()).await.unwrap();
            bridge.apply_status(0xC4).await;
            // An xoff-only frame must not clear busy
            bridge.apply_status(0xC1).await;
            assert!(bridge.state().busy);
            assert!(bridge.state().xoff);
        });
    }
}

use std::{
    io::ErrorKind,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket},
    sync::{
        atomic::{AtomicBool, AtomicU8, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use anyhow::Context;
use socket2::{Domain, Protocol, Socket, Type};

pub const DEFAULT_PORT: u16 = 49983;

const PROBE_TIMEOUT: Duration = Duration::from_millis(50);
const RECV_TIMEOUT: Duration = Duration::from_millis(100);

const INITIAL_INTERVAL: Duration = Duration::from_millis(12);
const MIN_INTERVAL: Duration = Duration::from_millis(4);
const INTERVAL_STEP: Duration = Duration::from_millis(1);
const PACING_WINDOW: u32 = 500;
const MIN_RATE_HZ: f32 = 50.;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    Stopped = 0,
    Probing = 1,
    Receiving = 2,
}

impl ReceiverState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => ReceiverState::Probing,
            2 => ReceiverState::Receiving,
            _ => ReceiverState::Stopped,
        }
    }
}

/// Latest-wins hand-off between the receive thread and the tick.
#[derive(Default)]
pub struct RawPacketSlot {
    payload: Mutex<Option<String>>,
}

impl RawPacketSlot {
    pub fn put(&self, payload: String) {
        *self.payload.lock().unwrap_or_else(PoisonError::into_inner) = Some(payload);
    }

    pub fn take(&self) -> Option<String> {
        self.payload
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

#[derive(Default)]
struct Shared {
    slot: RawPacketSlot,
    cancel: AtomicBool,
    state: AtomicU8,
}

impl Shared {
    fn set_state(&self, state: ReceiverState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// Adjusts the sleep between receives so a slow sender is not starved by our own pacing.
#[derive(Debug)]
pub(super) struct Pacing {
    interval: Duration,
    received: u32,
    window_start: Instant,
}

impl Pacing {
    pub fn new(now: Instant) -> Self {
        Self {
            interval: INITIAL_INTERVAL,
            received: 0,
            window_start: now,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn on_received(&mut self, now: Instant) {
        self.received += 1;
        if self.received < PACING_WINDOW {
            return;
        }

        let elapsed = now.saturating_duration_since(self.window_start).as_secs_f32();
        let rate = if elapsed > 0. {
            self.received as f32 / elapsed
        } else {
            f32::INFINITY
        };
        if rate < MIN_RATE_HZ && self.interval > MIN_INTERVAL {
            self.interval = self.interval.saturating_sub(INTERVAL_STEP).max(MIN_INTERVAL);
            log::debug!(
                "Face capture receive rate {:.1}/s, interval now {}ms",
                rate,
                self.interval.as_millis()
            );
        }
        self.reset(now);
    }

    pub fn reset(&mut self, now: Instant) {
        self.received = 0;
        self.window_start = now;
    }
}

pub struct FaceCaptureReceiver {
    port: u16,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl FaceCaptureReceiver {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            shared: Arc::new(Shared::default()),
            handle: None,
        }
    }

    pub fn start(&mut self) -> anyhow::Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }

        let v4 = UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.port))
            .with_context(|| format!("bind face capture socket on port {}", self.port))?;
        v4.set_read_timeout(Some(PROBE_TIMEOUT))?;

        let v6 = match bind_v6_only(self.port) {
            Ok(socket) => {
                socket.set_read_timeout(Some(PROBE_TIMEOUT))?;
                Some(socket)
            }
            Err(e) => {
                log::debug!("Face capture IPv6 socket unavailable: {}", e);
                None
            }
        };

        self.shared.slot.take();
        self.shared.cancel.store(false, Ordering::Relaxed);
        self.shared.set_state(ReceiverState::Probing);

        let shared = self.shared.clone();
        let handle = thread::Builder::new()
            .name("facecap-recv".into())
            .spawn(move || receive_loop(shared, v4, v6))
            .context("spawn face capture thread")?;
        self.handle = Some(handle);

        log::info!("Listening for face capture data on port {}", self.port);
        Ok(())
    }

    pub fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.shared.cancel.store(true, Ordering::Relaxed);
        if handle.join().is_err() {
            log::warn!("Face capture thread panicked");
        }
        self.shared.set_state(ReceiverState::Stopped);
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> ReceiverState {
        ReceiverState::from_u8(self.shared.state.load(Ordering::Relaxed))
    }

    #[allow(unused)]
    pub fn is_connected(&self) -> bool {
        self.state() == ReceiverState::Receiving
    }

    /// Most recent payload not yet consumed, if any.
    pub fn take_latest(&self) -> Option<String> {
        self.shared.slot.take()
    }
}

impl Drop for FaceCaptureReceiver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// IPv6 socket that leaves IPv4 traffic to the v4 socket on the same port.
fn bind_v6_only(port: u16) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_only_v6(true)?;
    socket.bind(&SocketAddr::new(IpAddr::V6(Ipv6Addr::UNSPECIFIED), port).into())?;
    Ok(socket.into())
}

fn receive_loop(shared: Arc<Shared>, v4: UdpSocket, v6: Option<UdpSocket>) {
    let mut buf = [0u8; 8192];

    let Some(socket) = probe(&shared, v4, v6, &mut buf) else {
        return;
    };
    if let Err(e) = socket.set_read_timeout(Some(RECV_TIMEOUT)) {
        log::debug!("Face capture set_read_timeout: {}", e);
    }
    log::info!(
        "Face capture connected via {}",
        if socket.local_addr().map(|a| a.is_ipv6()).unwrap_or(false) {
            "IPv6"
        } else {
            "IPv4"
        }
    );

    let mut pacing = Pacing::new(Instant::now());
    while !shared.cancelled() {
        match socket.recv(&mut buf) {
            Ok(size) => {
                shared
                    .slot
                    .put(String::from_utf8_lossy(&buf[..size]).into_owned());
                pacing.on_received(Instant::now());
            }
            Err(e) => {
                if !matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) {
                    log::debug!("Face capture receive error: {}", e);
                }
                pacing.reset(Instant::now());
            }
        }
        thread::sleep(pacing.interval());
    }
    log::debug!("Face capture thread exiting");
}

/// Alternates short receives on each socket until one yields a packet.
/// The winning socket is returned; the other is dropped.
fn probe(
    shared: &Shared,
    v4: UdpSocket,
    v6: Option<UdpSocket>,
    buf: &mut [u8],
) -> Option<UdpSocket> {
    let mut sockets = [Some(v4), v6];
    loop {
        for idx in 0..sockets.len() {
            if shared.cancelled() {
                return None;
            }
            let Some(socket) = sockets[idx].as_ref() else {
                continue;
            };
            if let Ok(size) = socket.recv(buf) {
                shared.set_state(ReceiverState::Receiving);
                shared
                    .slot
                    .put(String::from_utf8_lossy(&buf[..size]).into_owned());
                return sockets[idx].take();
            }
        }
    }
}

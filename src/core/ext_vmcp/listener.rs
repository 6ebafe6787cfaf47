use std::{
    net::{Ipv4Addr, SocketAddr, UdpSocket},
    sync::{
        atomic::{AtomicBool, Ordering},
        mpsc::{SyncSender, TrySendError},
        Arc,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use anyhow::Context;

use super::message::{decode_datagram, VmcpMessage};

const RECV_TIMEOUT: Duration = Duration::from_millis(100);

pub struct SlotMessage {
    pub slot: usize,
    pub message: VmcpMessage,
}

/// One OSC socket for one source slot. Decodes on its own thread and forwards.
pub struct VmcpListener {
    slot: usize,
    port: u16,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl VmcpListener {
    pub fn start(slot: usize, port: u16, sender: SyncSender<SlotMessage>) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port))
            .with_context(|| format!("VMCP{}: could not bind port {}", slot + 1, port))?;
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;

        let cancel = Arc::new(AtomicBool::new(false));
        let handle = {
            let cancel = cancel.clone();
            thread::Builder::new()
                .name(format!("vmcp-recv-{}", slot + 1))
                .spawn(move || listen_loop(slot, socket, sender, cancel))?
        };

        log::info!("VMCP{}: listening on port {}", slot + 1, port);
        Ok(Self {
            slot,
            port,
            cancel,
            handle: Some(handle),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn stop(&mut self) {
        self.cancel.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::warn!("VMCP{}: receive thread panicked", self.slot + 1);
            }
            log::info!("VMCP{}: stopped listening on port {}", self.slot + 1, self.port);
        }
    }
}

impl Drop for VmcpListener {
    fn drop(&mut self) {
        self.stop();
    }
}

fn listen_loop(
    slot: usize,
    socket: UdpSocket,
    sender: SyncSender<SlotMessage>,
    cancel: Arc<AtomicBool>,
) {
    let mut buf = [0u8; rosc::decoder::MTU];
    let mut messages = Vec::new();

    while !cancel.load(Ordering::Relaxed) {
        let Ok(size) = socket.recv(&mut buf) else {
            continue;
        };

        decode_datagram(&buf[..size], &mut messages);
        for message in messages.drain(..) {
            match sender.try_send(SlotMessage { slot, message }) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    log::debug!("VMCP{}: consumer lagging, dropping message", slot + 1);
                }
                Err(TrySendError::Disconnected(_)) => return,
            }
        }
    }
}

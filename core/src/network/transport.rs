//! Raw ICMP transport and an async echo client on top of it.
//!
//! One raw socket is shared by every ping. A blocking listener thread feeds
//! captured packets into a tokio channel, and a dispatcher task hands each
//! echo reply to the ping that is waiting for it.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::Context;
use doorlink_protocols::icmp::{self, EchoId};
use pnet::packet::{Packet, icmp::IcmpPacket, ip::IpNextHeaderProtocols};
use pnet::transport::{
    self, TransportChannelType, TransportProtocol, TransportReceiver, TransportSender,
};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const TRANSPORT_BUFFER_SIZE: usize = 4096;
const CHANNEL_TYPE_ICMP: TransportChannelType =
    TransportChannelType::Layer4(TransportProtocol::Ipv4(IpNextHeaderProtocols::Icmp));
const LISTENER_POLL: Duration = Duration::from_millis(250);
const ECHO_PAYLOAD: &[u8] = b"doorlink";

pub struct IcmpHandle {
    pub tx: TransportSender,
    pub rx: mpsc::UnboundedReceiver<(Vec<u8>, IpAddr)>,
}

/// Opens the raw ICMP socket. Fails without raw socket privileges.
pub fn start_icmp_capture() -> anyhow::Result<IcmpHandle> {
    let (tx, rx_socket) = open_channel()?;
    let (queue_tx, queue_rx) = mpsc::unbounded_channel();

    std::thread::Builder::new()
        .name("icmp-listener".into())
        .spawn(move || listen(rx_socket, queue_tx))
        .context("spawning ICMP listener")?;

    Ok(IcmpHandle { tx, rx: queue_rx })
}

fn open_channel() -> anyhow::Result<(TransportSender, TransportReceiver)> {
    let (tx, rx) = transport::transport_channel(TRANSPORT_BUFFER_SIZE, CHANNEL_TYPE_ICMP)
        .context("opening raw ICMP socket")?;
    Ok((tx, rx))
}

fn listen(mut rx_socket: TransportReceiver, queue_tx: mpsc::UnboundedSender<(Vec<u8>, IpAddr)>) {
    let mut iterator = transport::icmp_packet_iter(&mut rx_socket);
    while !queue_tx.is_closed() {
        match iterator.next_with_timeout(LISTENER_POLL) {
            Ok(Some((packet, source_ip))) => {
                if queue_tx.send((packet.packet().to_vec(), source_ip)).is_err() {
                    break;
                }
            }
            Ok(None) => continue,
            Err(e) => {
                warn!(%e, "ICMP listener stopped");
                break;
            }
        }
    }
}

type Waiters = Arc<Mutex<HashMap<(Ipv4Addr, EchoId), oneshot::Sender<()>>>>;

/// Sends ICMP echo requests and resolves when the matching reply arrives.
///
/// Must be created inside a tokio runtime.
pub struct Pinger {
    sender: Arc<Mutex<TransportSender>>,
    waiters: Waiters,
    identifier: u16,
    sequence: AtomicU16,
    dispatcher: JoinHandle<()>,
}

impl Pinger {
    pub fn start() -> anyhow::Result<Self> {
        let IcmpHandle { tx, rx } = start_icmp_capture()?;
        let waiters: Waiters = Arc::new(Mutex::new(HashMap::new()));
        let identifier: u16 = rand::random();
        let dispatcher = tokio::spawn(dispatch_replies(rx, waiters.clone(), identifier));

        Ok(Self {
            sender: Arc::new(Mutex::new(tx)),
            waiters,
            identifier,
            sequence: AtomicU16::new(0),
            dispatcher,
        })
    }

    /// Resolves to `true` once `addr` answers. Never resolves to `true` for
    /// a silent host, so callers bound it with a timeout.
    pub async fn ping(&self, addr: Ipv4Addr) -> bool {
        let id = EchoId {
            identifier: self.identifier,
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
        };
        let (reply_tx, reply_rx) = oneshot::channel();
        let _guard = WaiterGuard::register(&self.waiters, (addr, id), reply_tx);

        if let Err(e) = self.send_echo(addr, id).await {
            debug!(%addr, %e, "failed to send echo request");
            return false;
        }

        reply_rx.await.is_ok()
    }

    async fn send_echo(&self, addr: Ipv4Addr, id: EchoId) -> anyhow::Result<()> {
        let bytes: Vec<u8> = icmp::create_echo_request(id, ECHO_PAYLOAD)?;
        let sender = self.sender.clone();

        tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            let packet = IcmpPacket::new(&bytes).context("creating ICMP packet")?;
            let mut tx = sender.lock().unwrap_or_else(PoisonError::into_inner);
            tx.send_to(packet, IpAddr::V4(addr))?;
            Ok(())
        })
        .await??;
        Ok(())
    }
}

impl Drop for Pinger {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}

async fn dispatch_replies(
    mut rx: mpsc::UnboundedReceiver<(Vec<u8>, IpAddr)>,
    waiters: Waiters,
    identifier: u16,
) {
    while let Some((bytes, source_ip)) = rx.recv().await {
        let IpAddr::V4(source) = source_ip else {
            continue;
        };
        let Some(id) = icmp::parse_echo_reply(&bytes) else {
            continue;
        };
        if id.identifier != identifier {
            continue;
        }

        let waiter = waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(source, id));
        if let Some(waiter) = waiter {
            let _ = waiter.send(());
        }
    }
}

/// Removes a pending echo from the waiter table when the ping is dropped,
/// including when an outer timeout cancels it.
struct WaiterGuard<'a> {
    waiters: &'a Waiters,
    key: (Ipv4Addr, EchoId),
}

impl<'a> WaiterGuard<'a> {
    fn register(waiters: &'a Waiters, key: (Ipv4Addr, EchoId), reply_tx: oneshot::Sender<()>) -> Self {
        waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, reply_tx);
        Self { waiters, key }
    }
}

impl Drop for WaiterGuard<'_> {
    fn drop(&mut self) {
        self.waiters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

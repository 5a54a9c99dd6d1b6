// Numcro Discovery Responder
// Answers UDP discovery requests so broadcasters can find this host

use std::io::ErrorKind;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, ToSocketAddrs, UdpSocket};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::wire::DiscoveryMessage;
use super::TransportResult;
use crate::cancel::CancelToken;

const RECV_TIMEOUT: Duration = Duration::from_millis(100);

/// Local address a datagram to `peer` would leave from.
///
/// Connecting a UDP socket sends nothing; it only selects a route.
pub fn local_ip_for(peer: SocketAddr) -> Option<IpAddr> {
    let bind_addr: SocketAddr = match peer {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(bind_addr).ok()?;
    socket.connect(peer).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_unspecified() {
        None
    } else {
        Some(ip)
    }
}

/// Background UDP responder for discovery requests
#[derive(Debug)]
pub struct DiscoveryResponder {
    local_addr: SocketAddr,
    token: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl DiscoveryResponder {
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        host_id: impl Into<String>,
        parent: &CancelToken,
    ) -> TransportResult<Self> {
        let socket = UdpSocket::bind(addr)?;
        socket.set_read_timeout(Some(RECV_TIMEOUT))?;
        let local_addr = socket.local_addr()?;
        let token = parent.child();
        let host_id = host_id.into();

        let loop_token = token.clone();
        let handle = thread::Builder::new()
            .name("discovery".to_string())
            .spawn(move || respond_loop(socket, host_id, loop_token))?;

        log::info!("Discovery responder on udp://{}", local_addr);
        Ok(Self {
            local_addr,
            token,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Discovery thread panicked");
            }
        }
    }
}

impl Drop for DiscoveryResponder {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn respond_loop(socket: UdpSocket, host_id: String, token: CancelToken) {
    let mut buf = [0u8; 4096];

    while !token.is_cancelled() {
        let (len, peer) = match socket.recv_from(&mut buf) {
            Ok(received) => received,
            Err(e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => continue,
            Err(e) => {
                log::warn!("Discovery receive failed: {}", e);
                token.wait_timeout(RECV_TIMEOUT);
                continue;
            }
        };

        match serde_json::from_slice::<DiscoveryMessage>(&buf[..len]) {
            Ok(DiscoveryMessage::DiscoveryRequest) => {
                let ip = local_ip_for(peer)
                    .or_else(|| socket.local_addr().ok().map(|a| a.ip()).filter(|ip| !ip.is_unspecified()))
                    .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
                let response = DiscoveryMessage::DiscoveryResponse {
                    sender: host_id.clone(),
                    ip_address: ip.to_string(),
                };
                match serde_json::to_vec(&response) {
                    Ok(bytes) => {
                        if let Err(e) = socket.send_to(&bytes, peer) {
                            log::warn!("Discovery reply to {} failed: {}", peer, e);
                        } else {
                            log::debug!("Answered discovery from {} with {}", peer, ip);
                        }
                    }
                    Err(e) => log::error!("Failed to encode discovery reply: {}", e),
                }
            }
            Ok(other) => log::debug!("Ignoring discovery message from {}: {:?}", peer, other),
            Err(e) => log::debug!("Ignoring datagram from {}: {}", peer, e),
        }
    }
    log::debug!("Discovery responder stopped");
}

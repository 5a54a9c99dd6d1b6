// Numcro Network Source
// TCP listener for newline-delimited JSON key events

use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use super::wire::parse_event;
use super::TransportResult;
use crate::cancel::CancelToken;
use crate::event::EventSender;
use crate::input::EventSource;

/// Socket read timeout; bounds how long a client thread ignores cancellation
pub const READ_TIMEOUT: Duration = Duration::from_millis(100);

const ACCEPT_INTERVAL: Duration = Duration::from_millis(50);

/// Longest accepted record; longer lines are discarded up to their newline
pub const MAX_LINE_LEN: usize = 64 * 1024;

/// Accepts broadcaster connections and feeds their events into the queue
#[derive(Debug)]
pub struct NetworkSource {
    local_addr: SocketAddr,
    token: CancelToken,
    handle: Option<JoinHandle<()>>,
}

impl NetworkSource {
    /// Bind the listener and start accepting on a background thread
    pub fn bind<A: ToSocketAddrs>(
        addr: A,
        sender: EventSender,
        parent: &CancelToken,
    ) -> TransportResult<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        let token = parent.child();

        let accept_token = token.clone();
        let handle = thread::Builder::new()
            .name("net-accept".to_string())
            .spawn(move || accept_loop(listener, sender, accept_token))?;

        log::info!("Listening for key events on tcp://{}", local_addr);
        Ok(Self {
            local_addr,
            token,
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting, disconnect every client and wait for their threads
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Network accept thread panicked");
            }
        }
    }
}

impl Drop for NetworkSource {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(listener: TcpListener, sender: EventSender, token: CancelToken) {
    let mut clients: Vec<JoinHandle<()>> = Vec::new();

    while !token.is_cancelled() {
        match listener.accept() {
            Ok((stream, peer)) => {
                log::info!("Broadcaster connected: {}", peer);
                let client_sender = sender.clone();
                let client_token = token.clone();
                let spawned = thread::Builder::new()
                    .name(format!("net-client-{}", peer))
                    .spawn(move || client_loop(stream, peer, client_sender, client_token));
                match spawned {
                    Ok(handle) => clients.push(handle),
                    Err(e) => log::error!("Failed to start client thread for {}: {}", peer, e),
                }
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                token.wait_timeout(ACCEPT_INTERVAL);
            }
            Err(e) => {
                log::warn!("Accept failed: {}", e);
                token.wait_timeout(ACCEPT_INTERVAL);
            }
        }
        clients.retain(|c| !c.is_finished());
    }

    for client in clients {
        let _ = client.join();
    }
    log::debug!("Network accept loop stopped");
}

fn client_loop(stream: TcpStream, peer: SocketAddr, sender: EventSender, token: CancelToken) {
    if let Err(e) = configure_stream(&stream) {
        log::error!("Failed to configure connection from {}: {}", peer, e);
        return;
    }

    let mut reader = BufReader::new(stream);
    let mut line = Vec::new();
    let mut discarding = false;

    while !token.is_cancelled() {
        let limit = (MAX_LINE_LEN + 1).saturating_sub(line.len()) as u64;
        match (&mut reader).take(limit).read_until(b'\n', &mut line) {
            Ok(0) => {
                // EOF; a final unterminated line still counts
                if !line.is_empty() && !discarding {
                    handle_line(&line, peer, &sender);
                }
                break;
            }
            Ok(_) => {
                if line.ends_with(b"\n") {
                    if discarding {
                        discarding = false;
                        line.clear();
                        continue;
                    }
                    let keep_going = handle_line(&line, peer, &sender);
                    line.clear();
                    if !keep_going {
                        break;
                    }
                } else if line.len() > MAX_LINE_LEN {
                    if !discarding {
                        log::warn!(
                            "Dropping line from {}: longer than {} bytes",
                            peer,
                            MAX_LINE_LEN
                        );
                    }
                    discarding = true;
                    line.clear();
                }
            }
            Err(e)
                if matches!(
                    e.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) => {}
            Err(e) => {
                log::warn!("Connection from {} failed: {}", peer, e);
                break;
            }
        }
    }
    log::info!("Broadcaster disconnected: {}", peer);
}

fn configure_stream(stream: &TcpStream) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    stream.set_nodelay(true)
}

/// Decode and enqueue one line. Returns false once the queue is gone.
fn handle_line(raw: &[u8], peer: SocketAddr, sender: &EventSender) -> bool {
    let text = String::from_utf8_lossy(raw);
    let text = text.trim();
    if text.is_empty() {
        return true;
    }

    match parse_event(text, EventSource::Network(peer)) {
        Ok(event) => {
            log::trace!("[NET] {} from {}", event, peer);
            sender.push_input(event).is_ok()
        }
        Err(e) => {
            log::warn!("Dropping line from {}: {}", peer, e);
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EngineMessage, EventQueue};
    use std::io::Write;

    fn next_key(queue: &EventQueue) -> Option<String> {
        match queue.recv_timeout(Duration::from_secs(2)).unwrap() {
            Some(EngineMessage::Input(event)) => Some(event.key),
            _ => None,
        }
    }

    #[test]
    fn test_malformed_line_keeps_connection() {
        let queue = EventQueue::new(16);
        let root = CancelToken::new();
        let source = NetworkSource::bind("127.0.0.1:0", queue.sender(), &root).unwrap();

        let mut stream = TcpStream::connect(source.local_addr()).unwrap();
        stream.write_all(b"not json\n").unwrap();
        stream
            .write_all(b"{\"key\":\"a\",\"action\":\"press\"}\n")
            .unwrap();
        stream.flush().unwrap();

        assert_eq!(next_key(&queue).as_deref(), Some("a"));
        source.stop();
    }

    #[test]
    fn test_line_split_across_writes() {
        let queue = EventQueue::new(16);
        let root = CancelToken::new();
        let source = NetworkSource::bind("127.0.0.1:0", queue.sender(), &root).unwrap();

        let mut stream = TcpStream::connect(source.local_addr()).unwrap();
        stream.write_all(b"{\"key\":\"b\",").unwrap();
        stream.flush().unwrap();
        thread::sleep(Duration::from_millis(250));
        stream.write_all(b"\"action\":\"up\"}\n").unwrap();
        stream.flush().unwrap();

        assert_eq!(next_key(&queue).as_deref(), Some("b"));
        root.cancel();
        source.stop();
    }

    #[test]
    fn test_oversized_line_is_discarded() {
        let queue = EventQueue::new(16);
        let root = CancelToken::new();
        let source = NetworkSource::bind("127.0.0.1:0", queue.sender(), &root).unwrap();

        let mut stream = TcpStream::connect(source.local_addr()).unwrap();
        let mut oversized = b"{\"key\":\"x\",\"action\":\"press\",\"pad\":\"".to_vec();
        oversized.resize(MAX_LINE_LEN * 3, b'x');
        oversized.extend_from_slice(b"\"}\n");
        stream.write_all(&oversized).unwrap();
        stream
            .write_all(b"{\"key\":\"c\",\"action\":\"press\"}\n")
            .unwrap();
        stream.flush().unwrap();

        assert_eq!(next_key(&queue).as_deref(), Some("c"));
        source.stop();
    }
}

// Numcro Engine
// Wires the dispatch loop to its input sources and owns their lifetimes

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::cancel::CancelToken;
use crate::event::{DispatchLoop, EngineContext, EventQueue, EventSender};
use crate::macros::MacroPlayer;
use crate::notify::NotificationSink;
use crate::output::KeySink;
use crate::settings::NetworkSettings;
use crate::transport::{DiscoveryResponder, NetworkSource, TransportError};

#[cfg(feature = "local-hook")]
use crate::settings::HookSettings;
#[cfg(feature = "local-hook")]
use crate::transport::{HookSource, LocalHook};

/// Errors starting or stopping the engine
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Failed to start dispatch thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("Dispatch thread panicked")]
    DispatchPanicked,
}

/// A running engine: the dispatch thread plus any attached input sources
pub struct Engine {
    root: CancelToken,
    sender: EventSender,
    dispatch: Option<JoinHandle<EngineContext>>,
    network: Option<NetworkSource>,
    discovery: Option<DiscoveryResponder>,
    #[cfg(feature = "local-hook")]
    hook: Option<HookSource>,
}

impl Engine {
    /// Start the dispatch loop on its own thread
    pub fn start(
        ctx: EngineContext,
        queue_capacity: usize,
        sink: Arc<dyn KeySink>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Result<Self, EngineError> {
        let root = CancelToken::new();
        let queue = EventQueue::new(queue_capacity);
        let sender = queue.sender();
        let dispatch_loop = DispatchLoop::new(ctx, queue, MacroPlayer::new(sink), notifier);

        let token = root.child();
        let dispatch = thread::Builder::new()
            .name("dispatch".to_string())
            .spawn(move || dispatch_loop.run(&token))?;

        Ok(Self {
            root,
            sender,
            dispatch: Some(dispatch),
            network: None,
            discovery: None,
            #[cfg(feature = "local-hook")]
            hook: None,
        })
    }

    /// Producer handle for commands and synthetic input
    pub fn sender(&self) -> EventSender {
        self.sender.clone()
    }

    /// Accept broadcaster connections and, if configured, answer discovery
    pub fn start_network(&mut self, settings: &NetworkSettings) -> Result<(), EngineError> {
        let source = NetworkSource::bind(settings.listen_addr(), self.sender.clone(), &self.root)?;
        self.network = Some(source);
        self.start_discovery(settings)
    }

    /// Answer UDP discovery requests; a port of 0 disables the responder
    pub fn start_discovery(&mut self, settings: &NetworkSettings) -> Result<(), EngineError> {
        if settings.discovery_port == 0 {
            log::info!("Discovery responder disabled");
            return Ok(());
        }
        let responder =
            DiscoveryResponder::bind(settings.discovery_addr(), settings.host_id.clone(), &self.root)?;
        self.discovery = Some(responder);
        Ok(())
    }

    #[cfg(feature = "local-hook")]
    pub fn start_hook(&mut self, settings: &HookSettings) -> Result<(), EngineError> {
        let hook = LocalHook::open(&settings.devices, settings.grab)?;
        log::info!("Local hook attached to {} device(s)", hook.device_count());
        self.hook = Some(hook.spawn(self.sender.clone(), &self.root)?);
        Ok(())
    }

    pub fn network_addr(&self) -> Option<std::net::SocketAddr> {
        self.network.as_ref().map(NetworkSource::local_addr)
    }

    pub fn discovery_addr(&self) -> Option<std::net::SocketAddr> {
        self.discovery.as_ref().map(DiscoveryResponder::local_addr)
    }

    /// Stop every source, drain the queue and return the final engine state
    pub fn shutdown(mut self) -> Result<EngineContext, EngineError> {
        self.stop_sources();
        self.root.cancel();
        match self.dispatch.take() {
            Some(handle) => handle.join().map_err(|_| EngineError::DispatchPanicked),
            None => Err(EngineError::DispatchPanicked),
        }
    }

    fn stop_sources(&mut self) {
        #[cfg(feature = "local-hook")]
        if let Some(hook) = self.hook.take() {
            hook.stop();
        }
        if let Some(network) = self.network.take() {
            network.stop();
        }
        if let Some(discovery) = self.discovery.take() {
            discovery.stop();
        }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.stop_sources();
        self.root.cancel();
        if let Some(handle) = self.dispatch.take() {
            if handle.join().is_err() {
                log::error!("Dispatch thread panicked");
            }
        }
    }
}

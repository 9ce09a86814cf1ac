use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::sync::broadcast::{Receiver, Sender};

/// Broadcasts a request to stop a campaign.
///
/// Work in progress is never interrupted. Long running loops check a [ShutdownListener] between
/// simulator runs so that every run either completes and is recorded or is not started.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    sender: Sender<()>,
}

impl Default for ShutdownHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHandle {
    pub fn new() -> Self {
        Self {
            sender: tokio::sync::broadcast::channel(1).0,
        }
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.sender.send(()) {
            // Nobody is listening, nothing to stop.
            log::warn!("Failed to send shutdown signal: {e:?}");
        }
    }

    pub fn new_listener(&self) -> ShutdownListener {
        ShutdownListener::new(self.sender.subscribe())
    }
}

#[derive(Clone, Debug)]
pub struct ShutdownListener {
    receiver: Arc<Mutex<Receiver<()>>>,
    seen: Arc<Mutex<bool>>,
}

impl ShutdownListener {
    pub(crate) fn new(receiver: Receiver<()>) -> Self {
        Self {
            receiver: Arc::new(Mutex::new(receiver)),
            seen: Arc::new(Mutex::new(false)),
        }
    }

    /// Point in time check. Once this has returned true it keeps returning true.
    pub fn should_shutdown(&self) -> bool {
        let mut seen = self.seen.lock();
        if *seen {
            return true;
        }

        *seen = match self.receiver.lock().try_recv() {
            Ok(_) | Err(TryRecvError::Closed) => true,
            Err(TryRecvError::Lagged(_)) => true,
            Err(TryRecvError::Empty) => false,
        };
        *seen
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listener_latches_shutdown() {
        let handle = ShutdownHandle::new();
        let listener = handle.new_listener();
        let clone = listener.clone();
        assert!(!listener.should_shutdown());

        handle.shutdown();
        assert!(listener.should_shutdown());
        assert!(listener.should_shutdown());
        assert!(clone.should_shutdown());
    }

    #[test]
    fn dropped_handle_stops_listeners() {
        let handle = ShutdownHandle::new();
        let listener = handle.new_listener();
        drop(handle);
        assert!(listener.should_shutdown());
    }
}

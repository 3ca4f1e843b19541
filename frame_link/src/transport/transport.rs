//! Command channel between the two swapchain halves
//!
//! `Transport` is the sending seam, `CommandReceiver` the receiving one.
//! `LinkedTransport` is the in-process implementation: sends run the peer's
//! receiver synchronously on the calling thread, which is why swapchain
//! code never sends while holding its own locks.

use std::sync::{Arc, Mutex, Weak};

use crate::error::{Error, Result};
use crate::transport::command::Command;

/// Sending half of a command channel
pub trait Transport: Send + Sync {
    /// Deliver `command` to the peer
    ///
    /// Fails when the peer is gone or was never connected; the caller
    /// decides whether that is fatal.
    fn send(&self, command: Command) -> Result<()>;
}

/// Receiving half of a command channel
///
/// Implemented by both swapchain halves; wired to the transport when the
/// half connects.
pub trait CommandReceiver: Send + Sync {
    fn receive(&self, command: Command);
}

struct Endpoint {
    receiver: Mutex<Option<Arc<dyn CommandReceiver>>>,
}

/// In-process transport pair with synchronous delivery
pub struct LinkedTransport {
    local: Arc<Endpoint>,
    peer: Weak<Endpoint>,
}

impl LinkedTransport {
    /// Create two connected endpoints
    pub fn pair() -> (LinkedTransport, LinkedTransport) {
        let first = Arc::new(Endpoint {
            receiver: Mutex::new(None),
        });
        let second = Arc::new(Endpoint {
            receiver: Mutex::new(None),
        });
        (
            LinkedTransport {
                local: Arc::clone(&first),
                peer: Arc::downgrade(&second),
            },
            LinkedTransport {
                local: second,
                peer: Arc::downgrade(&first),
            },
        )
    }

    /// Attach the receiver that handles commands sent by the peer
    pub fn set_receiver(&self, receiver: Arc<dyn CommandReceiver>) {
        *self.local.receiver.lock().unwrap() = Some(receiver);
    }

    /// Detach the local receiver; subsequent peer sends fail
    pub fn clear_receiver(&self) {
        *self.local.receiver.lock().unwrap() = None;
    }
}

impl Transport for LinkedTransport {
    fn send(&self, command: Command) -> Result<()> {
        let peer = self
            .peer
            .upgrade()
            .ok_or_else(|| Error::BackendError(format!("peer gone, dropping {}", command)))?;
        // Clone the receiver out so it is dispatched without the lock held;
        // the handler may send back through this transport.
        let receiver = peer.receiver.lock().unwrap().clone();
        match receiver {
            Some(receiver) => {
                receiver.receive(command);
                Ok(())
            }
            None => Err(Error::BackendError(format!(
                "no receiver connected, dropping {}",
                command
            ))),
        }
    }
}

/// Transport that records sent commands instead of delivering them
#[cfg(test)]
pub struct RecordingTransport {
    sent: Mutex<Vec<Command>>,
    fail_sends: std::sync::atomic::AtomicBool,
}

#[cfg(test)]
impl RecordingTransport {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail_sends: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// All commands sent so far, in order
    pub fn sent(&self) -> Vec<Command> {
        self.sent.lock().unwrap().clone()
    }

    /// Make every following send fail
    pub fn fail_sends(&self) {
        self.fail_sends
            .store(true, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
impl Default for RecordingTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
impl Transport for RecordingTransport {
    fn send(&self, command: Command) -> Result<()> {
        if self.fail_sends.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(Error::BackendError(format!("send failed for {}", command)));
        }
        self.sent.lock().unwrap().push(command);
        Ok(())
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
mod tests;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use crate::protocol::{Event, EventBody};

const LOG_TARGET: &str = "table::events";

/// Bounded, non-blocking outbound event sink.
///
/// Events are submitted while the table lock is held, so clients observe
/// them in a legal order for the local state machine. The buffer is bounded;
/// an overflowing event is dropped with a warning rather than ever blocking
/// the table.
#[derive(Clone)]
pub struct EventSink {
    from: String,
    tx: mpsc::Sender<Event>,
}

impl EventSink {
    pub fn new(from: impl Into<String>, capacity: usize) -> (Self, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            Self {
                from: from.into(),
                tx,
            },
            rx,
        )
    }

    pub fn emit(&self, body: EventBody) {
        let kind = body.kind();
        match self.tx.try_send(Event::new(self.from.clone(), body)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(
                    target = LOG_TARGET,
                    event = kind,
                    "event buffer full, dropping event"
                );
            }
            Err(TrySendError::Closed(_)) => {
                warn!(
                    target = LOG_TARGET,
                    event = kind,
                    "event receiver gone, dropping event"
                );
            }
        }
    }
}

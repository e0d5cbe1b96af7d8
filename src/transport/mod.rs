//! The transport seam the engine consumes.
//!
//! How bytes move between peers is the transport's problem; the core only
//! needs an outbound sink and a stream of addressed inbound messages, plus
//! liveness callbacks that the transport surfaces as
//! [`TableCommand::Disconnected`]/[`TableCommand::Reconnected`].

use tokio::sync::mpsc;

use crate::domain::{Chips, PlayerId};
use crate::settlement::GameId;

/// Outbound side: targeted sends and table-wide broadcast.
///
/// Implementations MUST NOT block: the coordinator submits while holding
/// the table lock. Buffer internally and drop on overflow.
pub trait PeerSink: Send + Sync {
    fn send(&self, peer: &str, bytes: Vec<u8>);
    fn broadcast(&self, bytes: Vec<u8>);
}

/// One inbound transport message, already framed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Inbound {
    pub from: PlayerId,
    pub bytes: Vec<u8>,
}

/// Everything a table's inbound queue carries: wire traffic, liveness
/// transitions, local-player intents, and the coordinator's own timer and
/// settlement callbacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TableCommand {
    Message(Inbound),
    Joined(PlayerId),
    Left(PlayerId),
    Disconnected(PlayerId),
    Reconnected(PlayerId),
    /// The local player signals readiness for the next hand.
    LocalReady,
    /// The local player takes a betting action.
    LocalAction { action: String, value: Chips },
    /// Internal: a grace timer elapsed without reconnection.
    GraceExpired(PlayerId),
    /// Internal: the settlement adapter finished creating the on-chain game.
    SettlementCreated(GameId),
    Shutdown,
}

/// Channel-backed sink used by tests and local wiring: every submission
/// lands in an unbounded mpsc the consumer drains.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<(Option<PlayerId>, Vec<u8>)>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(Option<PlayerId>, Vec<u8>)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PeerSink for ChannelSink {
    fn send(&self, peer: &str, bytes: Vec<u8>) {
        let _ = self.tx.send((Some(peer.to_string()), bytes));
    }

    fn broadcast(&self, bytes: Vec<u8>) {
        let _ = self.tx.send((None, bytes));
    }
}

use crate::crypto::CryptoError;
use crate::protocol::ErrorCode;

/// Failures of the shuffle-and-deal exchange. Any of the first three abort
/// the hand with no pot distribution and surface the offending peer.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DealError {
    #[error("deck from {from} has {len} payloads, expected 52")]
    DeckMalformed { from: String, len: usize },
    #[error("peer {peer} revealed keys that fail inverse validation")]
    DishonestPeer { peer: String },
    #[error("decryption produced an out-of-range or duplicate card (slot {slot})")]
    InconsistentDecryption { slot: usize },
    #[error("unexpected {kind} from {from} in this phase")]
    UnexpectedMessage { from: String, kind: &'static str },
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

impl DealError {
    /// The peer whose input triggered the abort, when one is identifiable.
    pub fn offender(&self) -> Option<&str> {
        match self {
            DealError::DeckMalformed { from, .. } => Some(from),
            DealError::DishonestPeer { peer } => Some(peer),
            DealError::UnexpectedMessage { from, .. } => Some(from),
            _ => None,
        }
    }

    /// True for the conditions that abort the whole hand rather than just
    /// rejecting one message.
    pub fn aborts_hand(&self) -> bool {
        matches!(
            self,
            DealError::DeckMalformed { .. }
                | DealError::DishonestPeer { .. }
                | DealError::InconsistentDecryption { .. }
                | DealError::Crypto(_)
        )
    }

    pub fn wire_code(&self) -> ErrorCode {
        match self {
            DealError::UnexpectedMessage { .. } => ErrorCode::InvalidMessage,
            DealError::Crypto(_) => ErrorCode::InternalError,
            _ => ErrorCode::InvalidMessage,
        }
    }
}

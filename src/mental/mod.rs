//! The mental-poker shuffle-and-deal protocol.
//!
//! Per hand, the deck circulates once around the table: each player
//! commutatively encrypts every payload with their own SRA exponent and
//! Fisher–Yates shuffles before passing it on. Afterwards nobody knows the
//! slot-to-card mapping, and a card is revealed to a player only when every
//! other player contributes a partial decryption for that slot. Folding
//! reveals the folder's keys to the table; showdown reveals everyone's, so
//! every declared hand can be reconstructed and checked.

mod errors;
mod protocol;

#[cfg(test)]
mod tests;

pub use errors::DealError;
pub use protocol::{DealEvent, DealPhase, DealStep, MentalPokerHand, Outbound};

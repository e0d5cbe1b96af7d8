//! Commutative SRA cipher and the deck shuffle.
//!
//! Every player encrypts the deck with a private exponent over one shared
//! prime; commutativity of modular exponentiation is what lets the deck be
//! encrypted and shuffled by each player in turn without anyone learning the
//! slot-to-card mapping.

mod keys;
mod shuffle;

pub use keys::{default_prime, CardKeys, CryptoError};
pub use shuffle::{apply_permutation, shuffle_payloads, shuffled_indices, verify_shuffle};

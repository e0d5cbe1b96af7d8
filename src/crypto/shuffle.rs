use rand::{CryptoRng, Rng};

use super::keys::CryptoError;

/// A shuffle must displace at least this fraction of slots; anything less
/// means the RNG failed catastrophically.
const MIN_DISPLACED_NUM: usize = 4;
const MIN_DISPLACED_DEN: usize = 5;

const MAX_SHUFFLE_ATTEMPTS: usize = 8;

/// Random permutation of `0..n` by Fisher–Yates, uniform in `[0, i]` at
/// each step.
pub fn shuffled_indices<R: Rng + CryptoRng>(n: usize, rng: &mut R) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..n).collect();
    for i in (1..n).rev() {
        let j = rng.gen_range(0..=i);
        indices.swap(i, j);
    }
    indices
}

pub fn apply_permutation<T: Clone>(items: &[T], permutation: &[usize]) -> Vec<T> {
    debug_assert_eq!(items.len(), permutation.len());
    permutation.iter().map(|&idx| items[idx].clone()).collect()
}

/// True when at least ⌊4n/5⌋ slot contents differ from the input.
pub fn verify_shuffle<T: PartialEq>(original: &[T], shuffled: &[T]) -> bool {
    if original.len() != shuffled.len() {
        return false;
    }
    let displaced = original
        .iter()
        .zip(shuffled)
        .filter(|(a, b)| a != b)
        .count();
    displaced >= original.len() * MIN_DISPLACED_NUM / MIN_DISPLACED_DEN
}

/// Shuffle deck payloads, re-drawing the permutation until the non-identity
/// criterion holds. Bounded; exhaustion is only reachable with a broken RNG.
pub fn shuffle_payloads<R: Rng + CryptoRng>(
    payloads: &[Vec<u8>],
    rng: &mut R,
) -> Result<Vec<Vec<u8>>, CryptoError> {
    for _ in 0..MAX_SHUFFLE_ATTEMPTS {
        let permutation = shuffled_indices(payloads.len(), rng);
        let shuffled = apply_permutation(payloads, &permutation);
        if verify_shuffle(payloads, &shuffled) {
            return Ok(shuffled);
        }
    }
    Err(CryptoError::ShuffleDegenerate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn payloads() -> Vec<Vec<u8>> {
        (0u8..52).map(|b| vec![b]).collect()
    }

    #[test]
    fn shuffle_displaces_at_least_four_fifths() {
        let input = payloads();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let out = shuffle_payloads(&input, &mut rng).expect("shuffle");
            let displaced = input.iter().zip(&out).filter(|(a, b)| a != b).count();
            assert!(displaced >= 52 * 4 / 5, "only {displaced} slots moved");
        }
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let input = payloads();
        let mut rng = StdRng::seed_from_u64(12);
        let mut out = shuffle_payloads(&input, &mut rng).expect("shuffle");
        out.sort();
        assert_eq!(out, input);
    }

    #[test]
    fn verify_rejects_identity_and_near_identity() {
        let input = payloads();
        assert!(!verify_shuffle(&input, &input));

        // Swap one pair: 50 of 52 slots unchanged.
        let mut near = input.clone();
        near.swap(0, 1);
        assert!(!verify_shuffle(&input, &near));
    }

    #[test]
    fn verify_rejects_length_mismatch() {
        let input = payloads();
        assert!(!verify_shuffle(&input, &input[..51]));
    }

    #[test]
    fn permutation_application_reorders() {
        let items = vec![10u8, 20, 30];
        assert_eq!(apply_permutation(&items, &[2, 0, 1]), vec![30, 10, 20]);
    }
}

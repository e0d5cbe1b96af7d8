use num_bigint::{BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::One;
use once_cell::sync::Lazy;
use rand::rngs::OsRng;
use rand::{CryptoRng, Rng};

/// Keypair generation gives up after this many coprimality misses. With any
/// real prime the expected attempt count is tiny; hitting the bound means
/// the RNG or the modulus is broken.
const MAX_KEYGEN_ATTEMPTS: usize = 1000;

/// 2048-bit MODP group 14 modulus (RFC 3526). The protocol treats the prime
/// as a table parameter; this is only the default.
const DEFAULT_PRIME_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD129024E088A67CC74",
    "020BBEA63B139B22514A08798E3404DDEF9519B3CD3A431B302B0A6DF25F1437",
    "4FE1356D6D51C245E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE45B3DC2007CB8A163BF05",
    "98DA48361C55D39A69163FA8FD24CF5F83655D23DCA3AD961C62F356208552BB",
    "9ED529077096966D670C354E4ABC9804F1746C08CA18217C32905E462E36CE3B",
    "E39E772C180E86039B2783A2EC07A28FB5C55DF06F4C52C9DE2BCBF695581718",
    "3995497CEA956AE515D2261898FA051015728E5A8AACAA68FFFFFFFFFFFFFFFF",
);

static DEFAULT_PRIME: Lazy<BigUint> = Lazy::new(|| {
    BigUint::parse_bytes(DEFAULT_PRIME_HEX.as_bytes(), 16).expect("default prime hex")
});

pub fn default_prime() -> &'static BigUint {
    &DEFAULT_PRIME
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("failed to generate a coprime exponent after {0} attempts")]
    KeyGenExhausted(usize),
    #[error("key pair fails e*d = 1 (mod p-1)")]
    InvalidKeyPair,
    #[error("malformed key component: {0}")]
    MalformedKey(String),
    #[error("shuffle left the deck nearly in place after repeated attempts")]
    ShuffleDegenerate,
}

/// One player's SRA exponent pair over the table's shared prime.
///
/// Invariants: `e * d = 1 (mod p-1)` and `gcd(e, p-1) = 1`. Created once per
/// player per hand and dropped on hand reset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CardKeys {
    prime: BigUint,
    enc: BigUint,
    dec: BigUint,
}

impl CardKeys {
    /// Generate a keypair over the default modulus using the OS RNG.
    pub fn generate() -> Result<Self, CryptoError> {
        Self::generate_with(default_prime().clone(), &mut OsRng)
    }

    /// Generate a keypair over `prime`. Retries until the encryption
    /// exponent is coprime to `p-1`, bounded by [`MAX_KEYGEN_ATTEMPTS`].
    pub fn generate_with<R: Rng + CryptoRng>(
        prime: BigUint,
        rng: &mut R,
    ) -> Result<Self, CryptoError> {
        let one = BigUint::one();
        let phi = &prime - &one;
        let low = BigUint::from(2u8);
        let high = &prime - &one; // exclusive: e in [2, p-2]

        for _ in 0..MAX_KEYGEN_ATTEMPTS {
            let enc = rng.gen_biguint_range(&low, &high);
            if enc.gcd(&phi) != one {
                continue;
            }
            let dec = enc
                .modinv(&phi)
                .ok_or(CryptoError::KeyGenExhausted(MAX_KEYGEN_ATTEMPTS))?;
            return Ok(Self { prime, enc, dec });
        }
        Err(CryptoError::KeyGenExhausted(MAX_KEYGEN_ATTEMPTS))
    }

    /// Reassemble keys revealed by a peer. Performs inverse validation; a
    /// pair that fails it is evidence of a dishonest reveal.
    pub fn from_parts(prime: BigUint, enc: BigUint, dec: BigUint) -> Result<Self, CryptoError> {
        let keys = Self { prime, enc, dec };
        keys.validate()?;
        Ok(keys)
    }

    pub fn from_hex_parts(prime: &str, enc: &str, dec: &str) -> Result<Self, CryptoError> {
        let parse = |label: &str, hex: &str| {
            BigUint::parse_bytes(hex.as_bytes(), 16)
                .ok_or_else(|| CryptoError::MalformedKey(format!("{label} is not hex")))
        };
        Self::from_parts(
            parse("prime", prime)?,
            parse("encryption key", enc)?,
            parse("decryption key", dec)?,
        )
    }

    /// `e * d = 1 (mod p-1)`.
    pub fn validate(&self) -> Result<(), CryptoError> {
        let phi = &self.prime - BigUint::one();
        if (&self.enc * &self.dec) % phi == BigUint::one() {
            Ok(())
        } else {
            Err(CryptoError::InvalidKeyPair)
        }
    }

    pub fn prime(&self) -> &BigUint {
        &self.prime
    }

    /// `m^e mod p` over big-endian payload bytes.
    pub fn encrypt(&self, payload: &[u8]) -> Vec<u8> {
        let m = BigUint::from_bytes_be(payload);
        m.modpow(&self.enc, &self.prime).to_bytes_be()
    }

    /// `c^d mod p` over big-endian payload bytes.
    pub fn decrypt(&self, payload: &[u8]) -> Vec<u8> {
        let c = BigUint::from_bytes_be(payload);
        c.modpow(&self.dec, &self.prime).to_bytes_be()
    }

    pub fn encrypt_all(&self, payloads: &[Vec<u8>]) -> Vec<Vec<u8>> {
        payloads.iter().map(|p| self.encrypt(p)).collect()
    }

    pub fn decrypt_all(&self, payloads: &[Vec<u8>]) -> Vec<Vec<u8>> {
        payloads.iter().map(|p| self.decrypt(p)).collect()
    }

    pub fn prime_hex(&self) -> String {
        self.prime.to_str_radix(16)
    }

    pub fn enc_hex(&self) -> String {
        self.enc.to_str_radix(16)
    }

    pub fn dec_hex(&self) -> String {
        self.dec.to_str_radix(16)
    }
}

//! Hashing and signing primitives used for block identity and authorship.
//!
//! Digests are SHA-256. Signatures are compact (64 byte) secp256k1 ECDSA
//! signatures over the SHA-256 digest of the signed bytes.

use crate::Hash;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use sha2::{Digest, Sha256};

/// Hash the given bytes.
pub fn hash_bytes(bytes: &[u8]) -> Hash {
    Sha256::digest(bytes).into()
}

/// Hash the concatenation of the given byte slices.
pub fn hash_bytes_iter<'a>(iter: impl IntoIterator<Item = &'a [u8]>) -> Hash {
    let mut hasher = Sha256::new();
    for bytes in iter {
        hasher.update(bytes);
    }
    hasher.finalize().into()
}

/// Derive an ID from the first 8 bytes of a hash, read as a little-endian `i64`.
pub fn id_from_hash(hash: &Hash) -> i64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&hash[..8]);
    i64::from_le_bytes(bytes)
}

/// The serialized compressed public key for the given secret key.
pub fn public_key(secret_key: &SecretKey) -> Vec<u8> {
    PublicKey::from_secret_key(&Secp256k1::signing_only(), secret_key)
        .serialize()
        .to_vec()
}

/// Derive a secret key from an arbitrary seed phrase.
pub fn secret_key_from_seed(seed: &str) -> Result<SecretKey, secp256k1::Error> {
    SecretKey::from_slice(&hash_bytes(seed.as_bytes()))
}

/// Sign the digest of `bytes`, returning the compact signature.
pub fn sign(bytes: &[u8], secret_key: &SecretKey) -> Vec<u8> {
    let msg = Message::from_digest(hash_bytes(bytes));
    Secp256k1::signing_only()
        .sign_ecdsa(&msg, secret_key)
        .serialize_compact()
        .to_vec()
}

/// Verify a compact signature over the digest of `bytes`.
///
/// Malformed keys and signatures simply fail verification.
pub fn verify(bytes: &[u8], signature: &[u8], public_key: &[u8]) -> bool {
    let Ok(public_key) = PublicKey::from_slice(public_key) else {
        return false;
    };
    let Ok(signature) = Signature::from_compact(signature) else {
        return false;
    };
    let msg = Message::from_digest(hash_bytes(bytes));
    Secp256k1::verification_only()
        .verify_ecdsa(&msg, &signature, &public_key)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify() {
        let secret = secret_key_from_seed("sign_then_verify").unwrap();
        let public = public_key(&secret);
        let sig = sign(b"block bytes", &secret);
        assert_eq!(sig.len(), 64);
        assert!(verify(b"block bytes", &sig, &public));
        assert!(!verify(b"other bytes", &sig, &public));
        assert!(!verify(b"block bytes", &sig[1..], &public));
    }

    #[test]
    fn signatures_are_deterministic() {
        let secret = secret_key_from_seed("deterministic").unwrap();
        assert_eq!(sign(b"seed", &secret), sign(b"seed", &secret));
    }

    #[test]
    fn id_reads_little_endian_prefix() {
        let mut hash = [0u8; 32];
        hash[0] = 1;
        assert_eq!(id_from_hash(&hash), 1);
        hash[7] = 0x80;
        assert!(id_from_hash(&hash) < 0);
    }

    #[test]
    fn iter_hash_matches_concatenation() {
        let whole = hash_bytes(b"abcdef");
        let parts = hash_bytes_iter([&b"abc"[..], &b"def"[..]]);
        assert_eq!(whole, parts);
    }
}

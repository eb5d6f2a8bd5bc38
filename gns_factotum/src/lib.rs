//! The key agent ("factotum"): holds the user's private key material,
//! signs authentication challenges and directory-entry signatures, and
//! performs ECDH unwrap for end-to-end encrypted packing. The private
//! scalar never leaves this type; every other component requests an
//! operation (`sign`, `unwrap`) rather than the key itself.
//!
//! Two keys are derived from one 32-byte root secret, following the same
//! domain-separated `blake3::derive_key` convention used elsewhere in this
//! stack to turn one shared secret into several independent-looking keys:
//! an Ed25519 key for signing, and an X25519 key for ECDH-based content-key
//! wrapping. Deriving both from one root secret (rather than generating
//! them independently) means a single 32-byte value is sufficient to
//! reconstruct a user's full signing + unwrap capability.

use ed25519_dalek::{Signature, Signer, SigningKey as Ed25519SigningKey, Verifier, VerifyingKey};
use gns_core::hash::Hash;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret as X25519StaticSecret};
use zeroize::Zeroize;

const SIGN_CONTEXT: &str = "gns/factotum/ed25519";
const ECDH_CONTEXT: &str = "gns/factotum/x25519";

/// Public half of a factotum's key pair: what gets published to the key
/// registry and what a writer encrypts content keys against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicIdentity {
    pub signing: [u8; 32],
    pub ecdh: [u8; 32],
}

/// Holds the private key material for one user. Zeroizes both derived
/// secrets on drop.
pub struct Factotum {
    root_secret: [u8; 32],
    signing: Ed25519SigningKey,
    ecdh: X25519StaticSecret,
}

impl Factotum {
    /// Derives a factotum's signing and ECDH keys from a 32-byte root
    /// secret (e.g. loaded from a key file or provided by an external
    /// identity provider).
    pub fn from_root_secret(root_secret: [u8; 32]) -> Self {
        let signing_seed = blake3::derive_key(SIGN_CONTEXT, &root_secret);
        let ecdh_seed = blake3::derive_key(ECDH_CONTEXT, &root_secret);
        Self {
            root_secret,
            signing: Ed25519SigningKey::from_bytes(&signing_seed),
            ecdh: X25519StaticSecret::from(ecdh_seed),
        }
    }

    pub fn generate(rng: &mut impl rand_core::CryptoRngCore) -> Self {
        let mut root_secret = [0u8; 32];
        rng.fill_bytes(&mut root_secret);
        Self::from_root_secret(root_secret)
    }

    pub fn public_identity(&self) -> PublicIdentity {
        PublicIdentity {
            signing: self.signing.verifying_key().to_bytes(),
            ecdh: X25519PublicKey::from(&self.ecdh).to_bytes(),
        }
    }

    /// Signs an arbitrary message (the caller is responsible for hashing
    /// or structuring the message per the calling component's contract:
    /// the authenticated-RPC challenge in `gns_rpc`, or the stable entry
    /// fields in `gns_pack`).
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing.sign(message)
    }

    /// Unwraps a per-reader content key: performs X25519 ECDH with the
    /// writer's published ephemeral public key, yielding the shared secret
    /// the caller then uses to AEAD-open the wrapped content key.
    pub fn ecdh_shared_secret(&self, their_ephemeral_public: &[u8; 32]) -> [u8; 32] {
        self.ecdh
            .diffie_hellman(&X25519PublicKey::from(*their_ephemeral_public))
            .to_bytes()
    }

    /// Stable fingerprint of this factotum's identity, used by the
    /// packing engine's `ReaderHashes` to report which readers currently
    /// hold a wrapped key without revealing the key itself.
    pub fn reader_hash(&self) -> Hash {
        Hash::new(self.public_identity().ecdh)
    }
}

impl Drop for Factotum {
    fn drop(&mut self) {
        self.root_secret.zeroize();
    }
}

/// Verifies a signature against a known Ed25519 public key, without
/// requiring possession of the private key. Used by servers validating a
/// handshake and by packing unpackers validating an entry's signature.
pub fn verify(public_key: &[u8; 32], message: &[u8], signature: &[u8; 64]) -> anyhow::Result<()> {
    let verifying_key = VerifyingKey::from_bytes(public_key)?;
    let signature = Signature::from_bytes(signature);
    verifying_key.verify(message, &signature).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let factotum = Factotum::from_root_secret([9u8; 32]);
        let message = b"hello world";
        let signature = factotum.sign(message);
        verify(&factotum.public_identity().signing, message, &signature.to_bytes()).unwrap();
    }

    #[test]
    fn ecdh_shared_secret_agrees_both_directions() {
        let alice = Factotum::from_root_secret([1u8; 32]);
        let bob = Factotum::from_root_secret([2u8; 32]);

        let alice_pub = alice.public_identity().ecdh;
        let bob_pub = bob.public_identity().ecdh;

        let alice_secret = alice.ecdh_shared_secret(&bob_pub);
        let bob_secret = bob.ecdh_shared_secret(&alice_pub);
        assert_eq!(alice_secret, bob_secret);
    }

    #[test]
    fn tampered_message_fails_verification() {
        let factotum = Factotum::from_root_secret([3u8; 32]);
        let signature = factotum.sign(b"original");
        assert!(verify(&factotum.public_identity().signing, b"tampered", &signature.to_bytes()).is_err());
    }
}

//! Encryption of private shares to their receivers.
//!
//! Hashed ElGamal over X25519: an ephemeral Diffie-Hellman key, an
//! HMAC-SHA256 key derivation and ChaCha20-Poly1305. The ciphertext is the
//! ephemeral public key followed by the AEAD output.

use aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hmac::{Hmac, Mac};
use rand_core::CryptoRngCore;
use sha2::Sha256;
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

const KDF_DOMAIN: &[u8] = b"vss-share-encryption";
const PUBLIC_KEY_LEN: usize = 32;

/// Fresh X25519 secret key
pub fn generate_secret(rng: &mut dyn CryptoRngCore) -> StaticSecret {
    let mut bytes = Zeroizing::new([0u8; 32]);
    rng.fill_bytes(&mut bytes[..]);
    StaticSecret::from(*bytes)
}

fn derive_key(
    shared: &[u8],
    ephemeral: &PublicKey,
    receiver: &PublicKey,
) -> Result<Zeroizing<[u8; 32]>> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(shared)
        .map_err(|e| Error::Crypto(e.to_string()))?;
    mac.update(KDF_DOMAIN);
    mac.update(ephemeral.as_bytes());
    mac.update(receiver.as_bytes());
    Ok(Zeroizing::new(mac.finalize().into_bytes().into()))
}

/// Encrypt `plaintext` to `receiver`, binding it to `context`
pub fn encrypt(
    rng: &mut dyn CryptoRngCore,
    receiver: &PublicKey,
    context: &[u8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let ephemeral = generate_secret(rng);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(receiver);
    if !shared.was_contributory() {
        return Err(Error::Crypto("Receiver key has small order".into()));
    }
    let key = derive_key(shared.as_bytes(), &ephemeral_public, receiver)?;

    // Every key encrypts a single message.
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
    let ciphertext = cipher
        .encrypt(
            Nonce::from_slice(&[0u8; 12]),
            Payload {
                msg: plaintext,
                aad: context,
            },
        )
        .map_err(|e| Error::Crypto(e.to_string()))?;

    let mut out = Vec::with_capacity(PUBLIC_KEY_LEN + ciphertext.len());
    out.extend_from_slice(ephemeral_public.as_bytes());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a ciphertext produced by [`encrypt`] for the same `context`
pub fn decrypt(
    secret: &StaticSecret,
    context: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    if ciphertext.len() < PUBLIC_KEY_LEN {
        return Err(Error::Crypto("Ciphertext too short".into()));
    }
    let (head, body) = ciphertext.split_at(PUBLIC_KEY_LEN);
    let mut raw = [0u8; PUBLIC_KEY_LEN];
    raw.copy_from_slice(head);
    let ephemeral_public = PublicKey::from(raw);

    let shared = secret.diffie_hellman(&ephemeral_public);
    if !shared.was_contributory() {
        return Err(Error::Crypto("Ephemeral key has small order".into()));
    }
    let key = derive_key(shared.as_bytes(), &ephemeral_public, &PublicKey::from(secret))?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
    cipher
        .decrypt(
            Nonce::from_slice(&[0u8; 12]),
            Payload {
                msg: body,
                aad: context,
            },
        )
        .map(Zeroizing::new)
        .map_err(|e| Error::Crypto(e.to_string()))
}

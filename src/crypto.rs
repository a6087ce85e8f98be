//! Key generation, lookup hashing, and meta-blob encryption.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::{AppError, Result};

const KEY_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Site-wide secret. License key hashes and meta blobs are bound to it, so
/// rotating the secret strands every issued key. That is an operational
/// hazard, not a bug.
#[derive(Clone)]
pub struct SiteSecret(String);

impl SiteSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl std::fmt::Debug for SiteSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SiteSecret(..)")
    }
}

/// Generate a license key in XXXX-XXXX-XXXX-XXXX format from the OS CSPRNG.
/// Key guessability is a direct security property, so no general-purpose PRNG.
pub fn generate_license_key() -> String {
    let mut rng = OsRng;
    let mut part = || -> String {
        (0..4)
            .map(|_| KEY_CHARSET[rng.gen_range(0..KEY_CHARSET.len())] as char)
            .collect()
    };

    format!("{}-{}-{}-{}", part(), part(), part(), part())
}

/// Derive the lookup hash for a license key: HMAC-SHA256 keyed on the site
/// secret, hex encoded. Deterministic per (key, secret), so raw keys are
/// never persisted or compared directly.
pub fn hash_license_key(key: &str, secret: &SiteSecret) -> String {
    let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(key.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison of a raw key against a stored lookup hash.
pub fn verify_license_key_hash(key: &str, hash: &str, secret: &SiteSecret) -> bool {
    hash_license_key(key, secret)
        .as_bytes()
        .ct_eq(hash.as_bytes())
        .into()
}

/// Hash an owner API token for storage/lookup (raw tokens are shown once).
pub fn hash_secret(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(b"license-server-token-v1:");
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Opaque activation continuity token: 16 random bytes, hex.
pub fn generate_activation_token() -> String {
    let mut bytes = [0u8; 16];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Opaque owner API token: 32 random bytes, hex.
pub fn generate_api_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// RFC 4122 v4 install identifier.
pub fn generate_install_uuid() -> String {
    Uuid::new_v4().to_string()
}

fn derive_meta_key(secret: &SiteSecret) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(None, secret.as_bytes());
    let mut key = [0u8; 32];
    hk.expand(b"license-server-meta-v1", &mut key)
        .expect("32 bytes is a valid HKDF-SHA256 output length");
    key
}

/// Encrypt an auxiliary blob (license meta) with AES-256-GCM under a key
/// derived from the site secret. Output is base64(nonce || ciphertext).
pub fn encrypt_meta(plaintext: &str, secret: &SiteSecret) -> Result<String> {
    let key_bytes = derive_meta_key(secret);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

    let mut nonce_bytes = [0u8; 12];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .map_err(|_| AppError::Internal("Meta encryption failed".into()))?;

    let mut out = Vec::with_capacity(12 + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(out))
}

/// Decrypt a blob produced by [`encrypt_meta`]. Tampered or foreign-secret
/// blobs fail closed.
pub fn decrypt_meta(encoded: &str, secret: &SiteSecret) -> Result<String> {
    let data = BASE64
        .decode(encoded)
        .map_err(|_| AppError::Internal("Meta blob is not valid base64".into()))?;

    if data.len() < 12 {
        return Err(AppError::Internal("Meta blob too short".into()));
    }

    let (nonce_bytes, ciphertext) = data.split_at(12);
    let key_bytes = derive_meta_key(secret);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key_bytes));

    let plaintext = cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|_| AppError::Internal("Meta decryption failed".into()))?;

    String::from_utf8(plaintext).map_err(|_| AppError::Internal("Meta blob is not UTF-8".into()))
}

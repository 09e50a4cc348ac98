//! Encrypted connection profile storage.
//!
//! The profile file carries the services URL, the login and the
//! password encrypted under a caller-supplied 32-byte key; an HMAC
//! signature file sits next to it so a tampered profile is refused
//! before any credential is decrypted.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use hmac::{Hmac, Mac};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use cabinet_client::ClientConfig;

pub const ENCRYPTION_MAGIC: &[u8] = b"CABENC1";
pub const ENCRYPTION_ALGORITHM: &str = "xchacha20poly1305";
pub const SIGNATURE_ALGORITHM: &str = "hmac-sha256";

type HmacSha256 = Hmac<Sha256>;

/// On-disk connection profile. The password field holds the
/// hex-encoded encrypted blob, never the plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Profile {
    pub services_url: String,
    pub username: String,
    pub password: String,
}

pub fn read_hex_key_file(path: &Path) -> Result<[u8; 32]> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("failed to read key file {}", path.display()))?;
    let bytes = hex::decode(body.trim())
        .with_context(|| format!("key file must contain hex bytes: {}", path.display()))?;
    if bytes.len() != 32 {
        return Err(anyhow!(
            "key file {} must decode to exactly 32 bytes (got {})",
            path.display(),
            bytes.len()
        ));
    }

    let mut key = [0_u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}

pub fn encrypt_password(key: &[u8; 32], password: &str) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let mut nonce_bytes = [0_u8; 24];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce_bytes), password.as_bytes())
        .map_err(|err| anyhow!("failed to encrypt password: {err}"))?;

    let mut out = Vec::with_capacity(ENCRYPTION_MAGIC.len() + nonce_bytes.len() + ciphertext.len());
    out.extend_from_slice(ENCRYPTION_MAGIC);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub fn decrypt_password(key: &[u8; 32], encrypted: &[u8]) -> Result<String> {
    if encrypted.len() <= ENCRYPTION_MAGIC.len() + 24 {
        return Err(anyhow!("encrypted password is too short"));
    }
    if !encrypted.starts_with(ENCRYPTION_MAGIC) {
        return Err(anyhow!("encrypted password is missing expected header"));
    }

    let nonce_start = ENCRYPTION_MAGIC.len();
    let nonce_end = nonce_start + 24;
    let nonce = XNonce::from_slice(&encrypted[nonce_start..nonce_end]);
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key));
    let plaintext = cipher
        .decrypt(nonce, &encrypted[nonce_end..])
        .map_err(|err| anyhow!("failed to decrypt password: {err}"))?;
    String::from_utf8(plaintext).context("decrypted password is not valid UTF-8")
}

/// Write the profile and its signature file.
pub fn save(path: &Path, key: &[u8; 32], profile: &Profile) -> Result<()> {
    let body = serde_json::to_vec_pretty(profile).context("failed to serialize profile")?;
    fs::write(path, &body)
        .with_context(|| format!("failed to write profile {}", path.display()))?;

    let signature = sign(key, &body)?;
    let sig_path = signature_path(path);
    fs::write(&sig_path, signature)
        .with_context(|| format!("failed to write profile signature {}", sig_path.display()))?;
    Ok(())
}

/// Load the profile, verify its signature and decrypt the password.
pub fn load(path: &Path, key: &[u8; 32]) -> Result<ClientConfig> {
    let body =
        fs::read(path).with_context(|| format!("failed to read profile {}", path.display()))?;

    let sig_path = signature_path(path);
    let signature_hex = fs::read_to_string(&sig_path).with_context(|| {
        format!("profile signature file is missing; re-run `cab auth connect` ({})", sig_path.display())
    })?;
    verify(key, &body, signature_hex.trim())
        .with_context(|| format!("signature verification failed for {}", path.display()))?;

    let profile: Profile = serde_json::from_slice(&body)
        .with_context(|| format!("failed to parse profile {}", path.display()))?;
    let encrypted = hex::decode(profile.password.trim())
        .context("profile password field is not valid hex")?;
    let password = decrypt_password(key, &encrypted)?;

    Ok(ClientConfig { services_url: profile.services_url, username: profile.username, password })
}

fn sign(key: &[u8; 32], body: &[u8]) -> Result<String> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|err| anyhow!("failed to initialize signature key: {err}"))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

fn verify(key: &[u8; 32], body: &[u8], signature_hex: &str) -> Result<()> {
    let signature = hex::decode(signature_hex).context("profile signature is not valid hex")?;
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|err| anyhow!("failed to initialize signature verification key: {err}"))?;
    mac.update(body);
    mac.verify_slice(&signature).map_err(|_| anyhow!("profile signature does not match"))
}

fn signature_path(profile_path: &Path) -> PathBuf {
    let mut name = profile_path.as_os_str().to_os_string();
    name.push(".sig");
    PathBuf::from(name)
}

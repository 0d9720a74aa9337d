//! Per-NSR SSH key material.
//!
//! Each network service gets its own Ed25519 keypair at instantiation.
//! The public half is injected into every VDU's cloud-init; the private
//! seed is written under `<key_dir>/<nsr_id>/` and removed on terminate.

use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

const KEY_FILE: &str = "id_ed25519";

/// Published as `ssh_key_generated` on the NSR opdata record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NsKeyPair {
    /// OpenSSH `authorized_keys` line.
    pub public_key: String,
    pub private_key_file: PathBuf,
}

pub fn generate_keypair(key_dir: &Path, nsr_id: &str) -> Result<NsKeyPair, OrchestratorError> {
    let mut rng = rand::rngs::OsRng;
    let signing_key = SigningKey::generate(&mut rng);
    let public_key = openssh_public_key(&signing_key.verifying_key().to_bytes(), nsr_id);

    let dir = key_dir.join(nsr_id);
    std::fs::create_dir_all(&dir).map_err(|e| io_error(&dir, e))?;
    let private_key_file = dir.join(KEY_FILE);
    std::fs::write(&private_key_file, BASE64.encode(signing_key.to_bytes()))
        .map_err(|e| io_error(&private_key_file, e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(&private_key_file, perms)
            .map_err(|e| io_error(&private_key_file, e))?;
    }

    let pub_file = dir.join(format!("{}.pub", KEY_FILE));
    std::fs::write(&pub_file, &public_key).map_err(|e| io_error(&pub_file, e))?;

    Ok(NsKeyPair {
        public_key,
        private_key_file,
    })
}

/// Remove the key directory for `nsr_id`. Missing directories are fine.
pub fn remove_keypair(key_dir: &Path, nsr_id: &str) -> Result<(), OrchestratorError> {
    let dir = key_dir.join(nsr_id);
    match std::fs::remove_dir_all(&dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(&dir, e)),
    }
}

/// `ssh-ed25519 <base64 wire blob> <comment>`
fn openssh_public_key(key: &[u8; 32], comment: &str) -> String {
    const KEY_TYPE: &[u8] = b"ssh-ed25519";
    let mut blob = Vec::with_capacity(4 + KEY_TYPE.len() + 4 + key.len());
    blob.extend_from_slice(&(KEY_TYPE.len() as u32).to_be_bytes());
    blob.extend_from_slice(KEY_TYPE);
    blob.extend_from_slice(&(key.len() as u32).to_be_bytes());
    blob.extend_from_slice(key);
    format!("ssh-ed25519 {} nfvo-{}", BASE64.encode(blob), comment)
}

fn io_error(path: &Path, e: std::io::Error) -> OrchestratorError {
    OrchestratorError::config(format!("key material {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_and_removes_key_material() {
        let tmp = tempfile::tempdir().unwrap();
        let pair = generate_keypair(tmp.path(), "nsr-1").unwrap();
        assert!(pair.public_key.starts_with("ssh-ed25519 AAAAC3NzaC1lZDI1NTE5"));
        assert!(pair.public_key.ends_with(" nfvo-nsr-1"));
        assert!(pair.private_key_file.exists());

        let seed = BASE64
            .decode(std::fs::read_to_string(&pair.private_key_file).unwrap())
            .unwrap();
        assert_eq!(seed.len(), 32);

        remove_keypair(tmp.path(), "nsr-1").unwrap();
        assert!(!tmp.path().join("nsr-1").exists());
        remove_keypair(tmp.path(), "nsr-1").unwrap();
    }

    #[test]
    fn public_key_blob_layout() {
        let line = openssh_public_key(&[7u8; 32], "x");
        let b64 = line.split(' ').nth(1).unwrap();
        let blob = BASE64.decode(b64).unwrap();
        assert_eq!(&blob[..4], &[0, 0, 0, 11]);
        assert_eq!(&blob[4..15], b"ssh-ed25519");
        assert_eq!(&blob[15..19], &[0, 0, 0, 32]);
        assert_eq!(&blob[19..], &[7u8; 32]);
    }
}

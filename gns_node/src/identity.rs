//! Loads a node's 32-byte root secret from a key file, accepting either
//! hex text or raw bytes the way operators tend to have the key lying
//! around.

use std::path::Path;

pub fn load_secret_key(path: &Path) -> anyhow::Result<[u8; 32]> {
    let bytes = std::fs::read(path)?;
    if let Ok(text) = std::str::from_utf8(&bytes) {
        if let Ok(decoded) = hex::decode(text.trim()) {
            if let Ok(arr) = <[u8; 32]>::try_from(decoded.as_slice()) {
                return Ok(arr);
            }
        }
    }
    <[u8; 32]>::try_from(bytes.as_slice()).map_err(|_| anyhow::anyhow!("{}: secret key must be 32 raw bytes or their hex encoding", path.display()))
}

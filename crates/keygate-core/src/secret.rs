use rand::TryRngCore;
use rand::rngs::OsRng;

/// Random bytes behind every secret; rendered as twice as many hex chars.
pub const SECRET_BYTES: usize = 32;
/// Length of the indexed lookup prefix.
pub const PREFIX_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
#[error("os random source unavailable: {0}")]
pub struct SecretError(String);

/// Fresh 64-char lowercase hex secret from the OS CSPRNG.
pub fn generate_secret() -> Result<String, SecretError> {
    let mut bytes = [0u8; SECRET_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|err| SecretError(err.to_string()))?;
    Ok(hex::encode(bytes))
}

/// First `PREFIX_LEN` characters, or `None` when the input is shorter.
pub fn prefix_of(secret: &str) -> Option<&str> {
    match secret.char_indices().nth(PREFIX_LEN) {
        Some((end, _)) => Some(&secret[..end]),
        None if secret.chars().count() == PREFIX_LEN => Some(secret),
        None => None,
    }
}

/// One-way hashing of secrets for storage.
pub trait CredentialHasher: Send + Sync {
    fn hash(&self, secret: &str) -> Result<String, HashError>;

    /// Fails closed: mismatches and malformed hashes both yield `false`.
    fn verify(&self, hash: &str, candidate: &str) -> bool;
}

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("bcrypt error: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl CredentialHasher for BcryptHasher {
    fn hash(&self, secret: &str) -> Result<String, HashError> {
        Ok(bcrypt::hash(secret, self.cost)?)
    }

    fn verify(&self, hash: &str, candidate: &str) -> bool {
        bcrypt::verify(candidate, hash).unwrap_or(false)
    }
}

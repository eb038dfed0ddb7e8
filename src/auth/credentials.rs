use argon2::{self, Config as ArgonConfig};
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Password hashing failed: {0}")]
pub struct HashError(pub String);

/// Argon2 work factor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashConfig {
    /// Memory cost in KiB.
    pub mem_cost: u32,
    pub time_cost: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        let config = ArgonConfig::default();
        Self { mem_cost: config.mem_cost, time_cost: config.time_cost }
    }
}

pub fn hash_password(password: &str, cost: HashConfig) -> Result<String, HashError> {
    let salt: [u8; 16] = rand::thread_rng().gen();
    let config = ArgonConfig { mem_cost: cost.mem_cost, time_cost: cost.time_cost, ..ArgonConfig::default() };
    argon2::hash_encoded(password.as_bytes(), &salt, &config).map_err(|e| HashError(e.to_string()))
}

/// Returns false on a mismatch and on any hash that cannot be decoded.
pub fn verify_password(hash: &str, password: &str) -> bool {
    argon2::verify_encoded(hash, password.as_bytes()).unwrap_or(false)
}

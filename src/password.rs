use argon2::password_hash::{
    PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString, rand_core::OsRng,
};
use argon2::{Algorithm, Argon2, Params, Version};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PasswordError {
    Empty,
    InvalidParams(String),
    Hash(String),
}

impl std::fmt::Display for PasswordError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "password is empty"),
            Self::InvalidParams(e) => write!(f, "argon2 params: {e}"),
            Self::Hash(e) => write!(f, "argon2 hash: {e}"),
        }
    }
}

impl std::error::Error for PasswordError {}

/// Salted Argon2id hasher. The cost parameters only affect new hashes;
/// verification reads them back out of the PHC string.
#[derive(Debug, Clone)]
pub struct PasswordHasher {
    params: Params,
}

impl Default for PasswordHasher {
    fn default() -> Self {
        Self {
            params: Params::default(),
        }
    }
}

impl PasswordHasher {
    pub fn new(memory_kib: u32, iterations: u32, parallelism: u32) -> Result<Self, PasswordError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;
        Ok(Self { params })
    }

    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        if plaintext.is_empty() {
            return Err(PasswordError::Empty);
        }

        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone());
        let salt = SaltString::generate(&mut OsRng);
        let hash = argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::Hash(e.to_string()))?
            .to_string();
        Ok(hash)
    }
}

pub fn verify_password(hash: &str, plaintext: &str) -> bool {
    if plaintext.is_empty() {
        return false;
    }
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    if parsed.algorithm.as_str() != "argon2id" {
        return false;
    }
    Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
pub(crate) fn cheap_hasher() -> PasswordHasher {
    PasswordHasher::new(8, 1, 1).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_salted_phc_and_never_plaintext() {
        let hasher = cheap_hasher();
        let a = hasher.hash("secret1").unwrap();
        let b = hasher.hash("secret1").unwrap();

        assert_ne!(a, "secret1");
        assert!(a.starts_with("$argon2id$"));
        assert_ne!(a, b, "salts should differ");
    }

    #[test]
    fn verify_accepts_original_and_rejects_wrong() {
        let hasher = cheap_hasher();
        let hash = hasher.hash("secret1").unwrap();

        assert!(verify_password(&hash, "secret1"));
        assert!(!verify_password(&hash, "secret2"));
        assert!(!verify_password(&hash, ""));
    }

    #[test]
    fn verify_rejects_garbage_hash() {
        assert!(!verify_password("not-a-phc-string", "secret1"));
        assert!(!verify_password("", "secret1"));
    }

    #[test]
    fn hash_rejects_empty_password() {
        assert_eq!(cheap_hasher().hash(""), Err(PasswordError::Empty));
    }

    #[test]
    fn new_rejects_invalid_params() {
        let err = PasswordHasher::new(1, 1, 1).unwrap_err();
        assert!(matches!(err, PasswordError::InvalidParams(_)));
    }

    #[test]
    fn default_cost_hash_verifies() {
        let hash = PasswordHasher::default().hash("hunter2").unwrap();
        assert!(hash.contains("m=19456,t=2,p=1"));
        assert!(verify_password(&hash, "hunter2"));
    }
}

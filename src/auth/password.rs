use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::error::PesquisaError;

pub const SENHA_MIN_LEN: usize = 8;

/// Hashes a password into a PHC string (`$argon2id$...`).
pub fn hash_password(senha: &str) -> Result<String, PesquisaError> {
    if senha.chars().count() < SENHA_MIN_LEN {
        return Err(PesquisaError::ValidationError(format!(
            "Senha deve ter pelo menos {} caracteres",
            SENHA_MIN_LEN
        )));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(senha.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| PesquisaError::AuthError(format!("Failed to hash password: {}", e)))
}

/// Malformed stored hashes verify as `false`.
pub fn verify_password(senha: &str, senha_hash: &str) -> bool {
    match PasswordHash::new(senha_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(senha.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

const LOG_TARGET: &str = "gateway::auth";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid token")]
    InvalidToken,
}

/// Claims carried by an access token. Tokens are issued by the account
/// service; extra claims it adds are ignored here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    pub username: String,
    pub exp: u64,
}

/// Validates bearer tokens against the shared signing secret.
#[derive(Clone)]
pub struct TokenVerifier {
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|error| {
                debug!(target = LOG_TARGET, error = %error, "token rejected");
                AuthError::InvalidToken
            })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    use super::*;

    const SECRET: &str = "sync-test-secret";

    fn sign(secret: &str, claims: &serde_json::Value) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn accepts_a_valid_token_and_ignores_extra_claims() {
        let token = sign(
            SECRET,
            &json!({
                "id": "user-1",
                "username": "ada",
                "provider": 0,
                "role": 1,
                "exp": Utc::now().timestamp() + 3600,
            }),
        );

        let claims = TokenVerifier::new(SECRET).verify(&token).unwrap();
        assert_eq!(claims.id, "user-1");
        assert_eq!(claims.username, "ada");
    }

    #[test]
    fn rejects_a_token_signed_with_another_secret() {
        let token = sign(
            "other-secret",
            &json!({
                "id": "user-1",
                "username": "ada",
                "exp": Utc::now().timestamp() + 3600,
            }),
        );
        assert_eq!(
            TokenVerifier::new(SECRET).verify(&token),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn rejects_an_expired_token() {
        let token = sign(
            SECRET,
            &json!({
                "id": "user-1",
                "username": "ada",
                "exp": Utc::now().timestamp() - 3600,
            }),
        );
        assert_eq!(
            TokenVerifier::new(SECRET).verify(&token),
            Err(AuthError::InvalidToken)
        );
    }
}

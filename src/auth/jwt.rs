use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::{AuthError, Claims, UserRole, UserSession};

/// Verifies HS256 bearer tokens signed with the secret shared with the auth provider
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: Option<String>,
    token_expires_in: Duration,
}

impl std::fmt::Debug for JwtService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtService")
            .field("encoding_key", &"[REDACTED]")
            .field("decoding_key", &"[REDACTED]")
            .field("issuer", &self.issuer)
            .field("token_expires_in", &self.token_expires_in)
            .finish()
    }
}

impl JwtService {
    pub fn new(secret: &str, issuer: Option<String>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            token_expires_in: Duration::hours(1),
        }
    }

    /// Sign a token with the shared secret. Used by tests and local tooling
    /// that stand in for the auth provider.
    pub fn create_access_token(
        &self,
        user_id: &str,
        email: &str,
        role: UserRole,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now + self.token_expires_in;

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            name: None,
            role,
            exp: exp.timestamp() as usize,
            iat: now.timestamp() as usize,
            iss: self.issuer.clone(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AuthError::Jwt)
    }

    /// Validate and decode a token
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = &self.issuer {
            validation.set_issuer(&[issuer]);
        }

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|token_data| token_data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }

    /// Extract user session from token
    pub fn extract_user_session(&self, token: &str) -> Result<UserSession, AuthError> {
        let claims = self.validate_token(token)?;
        UserSession::from_claims(&claims).ok_or(AuthError::InvalidToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_jwt_creation_and_validation() {
        let jwt_service = JwtService::new("test_secret", None);

        let token = jwt_service
            .create_access_token("user_2abc", "lifter@example.com", UserRole::User)
            .unwrap();

        let claims = jwt_service.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "user_2abc");
        assert_eq!(claims.email, "lifter@example.com");
        assert_eq!(claims.role, UserRole::User);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let issuer = JwtService::new("provider_secret", None);
        let verifier = JwtService::new("other_secret", None);

        let token = issuer
            .create_access_token("user_1", "a@example.com", UserRole::Admin)
            .unwrap();

        assert_matches!(verifier.validate_token(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_issuer_is_enforced_when_configured() {
        let provider = JwtService::new("secret", Some("https://auth.example.com".to_string()));
        let other = JwtService::new("secret", Some("https://evil.example.com".to_string()));

        let token = other
            .create_access_token("user_1", "a@example.com", UserRole::User)
            .unwrap();
        assert!(provider.validate_token(&token).is_err());

        let token = provider
            .create_access_token("user_1", "a@example.com", UserRole::User)
            .unwrap();
        assert!(provider.validate_token(&token).is_ok());
    }

    #[test]
    fn test_missing_role_claim_defaults_to_user() {
        let service = JwtService::new("secret", None);
        let now = Utc::now().timestamp() as usize;
        let claims = serde_json::json!({
            "sub": "user_9",
            "email": "nine@example.com",
            "exp": now + 600,
            "iat": now,
        });
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret("secret".as_bytes()),
        )
        .unwrap();

        let session = service.extract_user_session(&token).unwrap();
        assert_eq!(session.role, UserRole::User);
        assert_eq!(session.user_id, "user_9");
    }
}

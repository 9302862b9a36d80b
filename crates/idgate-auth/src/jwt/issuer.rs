//! Signed token pair minting.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use uuid::Uuid;

use idgate_core::config::auth::AuthConfig;
use idgate_core::error::AppError;
use idgate_entity::{Identity, PermissionClaim};

use super::claims::{Claims, TokenType};

/// Mints signed access/refresh token pairs.
///
/// Issuance is a pure function of its inputs, the signing key, and the
/// clock; no side effects. A signing failure is fatal and never retried
/// here.
#[derive(Clone)]
pub struct TokenIssuer {
    /// HMAC key for signing.
    encoding_key: EncodingKey,
    /// HMAC key for verification.
    decoding_key: DecodingKey,
    /// Validation configuration for decoding.
    validation: Validation,
    /// Access token TTL in minutes.
    access_ttl_minutes: i64,
    /// Refresh token TTL in days.
    refresh_ttl_days: i64,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl_minutes", &self.access_ttl_minutes)
            .field("refresh_ttl_days", &self.refresh_ttl_days)
            .finish()
    }
}

/// Result of a successful token pair generation.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TokenPair {
    /// Short-lived access token.
    pub access_token: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// Access token expiration timestamp.
    pub access_expires_at: DateTime<Utc>,
    /// Refresh token expiration timestamp.
    pub refresh_expires_at: DateTime<Utc>,
}

impl TokenIssuer {
    /// Creates a new issuer from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 5; // seconds of clock-skew tolerance

        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation,
            access_ttl_minutes: config.access_ttl_minutes as i64,
            refresh_ttl_days: config.refresh_ttl_days as i64,
        }
    }

    /// Mints an access + refresh pair for an identity and session.
    ///
    /// The access token carries the resolved permission claim and scope
    /// grants; the refresh token carries only subject, session, and the
    /// type marker.
    pub fn issue(
        &self,
        identity: &Identity,
        permissions: &PermissionClaim,
        session_id: Uuid,
    ) -> Result<TokenPair, AppError> {
        let now = Utc::now();
        let access_exp = now + Duration::minutes(self.access_ttl_minutes);
        let refresh_exp = now + Duration::days(self.refresh_ttl_days);

        let access_claims = Claims {
            sub: identity.id,
            sid: session_id,
            role_id: Some(identity.role_id),
            tenant_id: Some(identity.tenant_id),
            permissions: permissions.claim_values(),
            scopes: identity.scopes.clone(),
            iat: now.timestamp(),
            exp: access_exp.timestamp(),
            jti: Uuid::new_v4(),
            token_type: TokenType::Access,
        };

        let refresh_claims = Claims {
            sub: identity.id,
            sid: session_id,
            role_id: None,
            tenant_id: None,
            permissions: Vec::new(),
            scopes: Vec::new(),
            iat: now.timestamp(),
            exp: refresh_exp.timestamp(),
            jti: Uuid::new_v4(),
            token_type: TokenType::Refresh,
        };

        let access_token = encode(&Header::default(), &access_claims, &self.encoding_key)
            .map_err(|e| AppError::signing(format!("Failed to sign access token: {e}")))?;

        let refresh_token = encode(&Header::default(), &refresh_claims, &self.encoding_key)
            .map_err(|e| AppError::signing(format!("Failed to sign refresh token: {e}")))?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            access_expires_at: access_exp,
            refresh_expires_at: refresh_exp,
        })
    }

    /// Decodes and verifies a token of the expected type.
    pub fn decode(&self, token: &str, expected: TokenType) -> Result<Claims, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::authentication(format!("Token validation failed: {e}")))?;

        if data.claims.token_type != expected {
            return Err(AppError::authentication("Unexpected token type"));
        }

        Ok(data.claims)
    }

    /// The session expiry to apply on issuance and rotation: tied to
    /// the refresh token lifetime.
    pub fn session_expiry(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        from + Duration::days(self.refresh_ttl_days)
    }
}

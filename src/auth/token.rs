//! Compact signed session tokens.
//!
//! A token is `base64url(header).base64url(claims).base64url(signature)` where
//! the signature is HMAC-SHA256 over the first two segments. This is the
//! HS256 JWT envelope, so standard JWT libraries can read the tokens. The
//! payload carries a `token_type` so a refresh token can never be presented
//! where an access token is expected.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

const ALGORITHM: &str = "HS256";
const TOKEN_KIND: &str = "JWT";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Verified identity facts carried by a session token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    pub user_id: i32,
    pub name: String,
    pub role: String,
    pub is_active: bool,
    #[serde(rename = "iat")]
    pub issued_at: i64,
    #[serde(rename = "exp")]
    pub expires_at: i64,
    pub token_type: TokenType,
}

impl Claims {
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.expires_at, 0)
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.expires_at
    }
}

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("token is not a three-part envelope")]
    Malformed,

    #[error("unsupported token header")]
    UnsupportedHeader,

    #[error("token segment is not valid base64url")]
    Encoding,

    #[error("token payload could not be decoded: {0}")]
    Payload(String),

    #[error("token signature does not match")]
    BadSignature,

    #[error("token has expired")]
    Expired,

    #[error("token signing key is unusable")]
    Key,
}

/// Signs and verifies tokens with a symmetric key.
#[derive(Clone)]
pub struct TokenCodec {
    secret: Vec<u8>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").finish_non_exhaustive()
    }
}

impl TokenCodec {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        let header = Header {
            alg: ALGORITHM.to_string(),
            typ: TOKEN_KIND.to_string(),
        };
        let header_json =
            serde_json::to_vec(&header).map_err(|e| TokenError::Payload(e.to_string()))?;
        let claims_json =
            serde_json::to_vec(claims).map_err(|e| TokenError::Payload(e.to_string()))?;

        let signing_input = format!(
            "{}.{}",
            URL_SAFE_NO_PAD.encode(header_json),
            URL_SAFE_NO_PAD.encode(claims_json)
        );
        let signature = self.mac(&signing_input)?.finalize().into_bytes();

        Ok(format!(
            "{}.{}",
            signing_input,
            URL_SAFE_NO_PAD.encode(signature)
        ))
    }

    /// Verify structure, signature and expiry, returning the claims.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let claims = self.verify_signature(token)?;
        if claims.is_expired_at(now) {
            return Err(TokenError::Expired);
        }
        Ok(claims)
    }

    fn verify_signature(&self, token: &str) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let (Some(header_b64), Some(claims_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let header_json = URL_SAFE_NO_PAD
            .decode(header_b64)
            .map_err(|_| TokenError::Encoding)?;
        let header: Header =
            serde_json::from_slice(&header_json).map_err(|_| TokenError::UnsupportedHeader)?;
        if header.alg != ALGORITHM || header.typ != TOKEN_KIND {
            return Err(TokenError::UnsupportedHeader);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Encoding)?;
        // verify_slice compares in constant time
        self.mac(&format!("{}.{}", header_b64, claims_b64))?
            .verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims_json = URL_SAFE_NO_PAD
            .decode(claims_b64)
            .map_err(|_| TokenError::Encoding)?;
        serde_json::from_slice(&claims_json).map_err(|e| TokenError::Payload(e.to_string()))
    }

    fn mac(&self, signing_input: &str) -> Result<HmacSha256, TokenError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret).map_err(|_| TokenError::Key)?;
        mac.update(signing_input.as_bytes());
        Ok(mac)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn claims(token_type: TokenType, ttl: Duration) -> Claims {
        let now = Utc::now();
        Claims {
            user_id: 3,
            name: "wang".to_string(),
            role: "worker".to_string(),
            is_active: true,
            issued_at: now.timestamp(),
            expires_at: (now + ttl).timestamp(),
            token_type,
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let codec = TokenCodec::new("secret");
        let original = claims(TokenType::Access, Duration::minutes(15));
        let token = codec.sign(&original).expect("sign");

        assert_eq!(token.split('.').count(), 3);
        let decoded = codec.verify(&token, Utc::now()).expect("verify");
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_payload_uses_jwt_field_names() {
        let codec = TokenCodec::new("secret");
        let token = codec
            .sign(&claims(TokenType::Refresh, Duration::days(7)))
            .expect("sign");
        let payload = token.split('.').nth(1).expect("payload segment");
        let json: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).expect("b64")).expect("json");

        assert!(json.get("exp").is_some());
        assert!(json.get("iat").is_some());
        assert_eq!(json["token_type"], "refresh");
    }

    #[test]
    fn test_rejects_wrong_key() {
        let token = TokenCodec::new("one")
            .sign(&claims(TokenType::Access, Duration::minutes(5)))
            .expect("sign");
        assert_eq!(
            TokenCodec::new("two").verify(&token, Utc::now()),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_rejects_tampered_payload() {
        let codec = TokenCodec::new("secret");
        let token = codec
            .sign(&claims(TokenType::Access, Duration::minutes(5)))
            .expect("sign");
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();

        let mut forged = claims(TokenType::Access, Duration::minutes(5));
        forged.role = "admin".to_string();
        parts[1] = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).expect("json"));

        assert_eq!(
            codec.verify(&parts.join("."), Utc::now()),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_rejects_expired() {
        let codec = TokenCodec::new("secret");
        let token = codec
            .sign(&claims(TokenType::Access, Duration::minutes(1)))
            .expect("sign");
        let later = Utc::now() + Duration::minutes(2);
        assert_eq!(codec.verify(&token, later), Err(TokenError::Expired));
    }

    #[test]
    fn test_rejects_malformed() {
        let codec = TokenCodec::new("secret");
        assert_eq!(codec.verify("abc", Utc::now()), Err(TokenError::Malformed));
        assert_eq!(
            codec.verify("a.b.c.d", Utc::now()),
            Err(TokenError::Malformed)
        );
        assert_eq!(
            codec.verify("!!.??.**", Utc::now()),
            Err(TokenError::Encoding)
        );
    }
}

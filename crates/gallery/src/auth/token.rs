//! Signed session tokens.
//!
//! Tokens use the JWT compact form (`header.payload.signature`, base64url
//! without padding) signed with HMAC-SHA512. The claims carry the subject
//! email, role and numeric user id plus issue and expiry timestamps.
//! Verification needs only the token and the shared key.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use sha2::Sha512;
use thiserror::Error;

use bid_gallery_core::{Email, Role, UserId};

use super::Identity;

type HmacSha512 = Hmac<Sha512>;

/// How long an issued token stays valid.
pub const TOKEN_TTL: Duration = Duration::hours(24);

const ALGORITHM: &str = "HS512";

/// Why a token was refused. All variants mean "unauthenticated" to the
/// caller; they are kept apart for logging.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,
    #[error("token signature mismatch")]
    BadSignature,
    #[error("token expired")]
    Expired,
}

impl TokenError {
    /// Short label for structured logs.
    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Malformed => "malformed",
            Self::BadSignature => "bad_signature",
            Self::Expired => "expired",
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Email,
    role: Role,
    uid: UserId,
    iat: i64,
    exp: i64,
}

/// Issues and verifies session tokens with a shared secret.
#[derive(Clone)]
pub struct TokenCodec {
    mac: HmacSha512,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec").field("key", &"[REDACTED]").finish()
    }
}

impl TokenCodec {
    /// # Errors
    ///
    /// Returns an error if the key is rejected by the MAC, which HMAC never
    /// does in practice.
    pub fn new(secret: &SecretString) -> Result<Self, hmac::digest::InvalidLength> {
        let mac = HmacSha512::new_from_slice(secret.expose_secret().as_bytes())?;
        Ok(Self { mac })
    }

    /// Issue a token valid for [`TOKEN_TTL`] from now.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be serialized.
    pub fn issue(&self, identity: &Identity) -> Result<String, serde_json::Error> {
        self.issue_at(identity, Utc::now())
    }

    /// Verify a token against the current time.
    ///
    /// # Errors
    ///
    /// See [`TokenCodec::verify_at`].
    pub fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims cannot be serialized.
    pub fn issue_at(
        &self,
        identity: &Identity,
        now: DateTime<Utc>,
    ) -> Result<String, serde_json::Error> {
        let header = Header {
            alg: ALGORITHM.to_owned(),
            typ: "JWT".to_owned(),
        };
        let claims = Claims {
            sub: identity.subject.clone(),
            role: identity.role,
            uid: identity.user_id,
            iat: now.timestamp(),
            exp: (now + TOKEN_TTL).timestamp(),
        };

        let signing_input = format!("{}.{}", encode_json(&header)?, encode_json(&claims)?);
        let signature = URL_SAFE_NO_PAD.encode(self.sign(signing_input.as_bytes()));
        Ok(format!("{signing_input}.{signature}"))
    }

    /// Verify a token as if the current time were `now`.
    ///
    /// The signature is checked before the payload is interpreted.
    ///
    /// # Errors
    ///
    /// - `TokenError::Malformed` if the token is not three base64url segments,
    ///   names another algorithm, or carries unreadable claims
    /// - `TokenError::BadSignature` if the MAC does not match
    /// - `TokenError::Expired` if `now` is at or past the expiry
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<Identity, TokenError> {
        let mut parts = token.trim().split('.');
        let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(TokenError::Malformed);
        };

        let header: Header = decode_json(header_b64)?;
        if header.alg != ALGORITHM {
            return Err(TokenError::Malformed);
        }

        let signature = URL_SAFE_NO_PAD
            .decode(signature_b64)
            .map_err(|_| TokenError::Malformed)?;
        let mut mac = self.mac.clone();
        mac.update(header_b64.as_bytes());
        mac.update(b".");
        mac.update(payload_b64.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| TokenError::BadSignature)?;

        let claims: Claims = decode_json(payload_b64)?;
        if now.timestamp() >= claims.exp {
            return Err(TokenError::Expired);
        }

        Ok(Identity {
            user_id: claims.uid,
            subject: claims.sub,
            role: claims.role,
        })
    }

    fn sign(&self, input: &[u8]) -> Vec<u8> {
        let mut mac = self.mac.clone();
        mac.update(input);
        mac.finalize().into_bytes().to_vec()
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_vec(value).map(|json| URL_SAFE_NO_PAD.encode(json))
}

fn decode_json<T: for<'de> Deserialize<'de>>(segment: &str) -> Result<T, TokenError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| TokenError::Malformed)?;
    serde_json::from_slice(&bytes).map_err(|_| TokenError::Malformed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn codec() -> TokenCodec {
        TokenCodec::new(&SecretString::from("kP9$wQ2!vX7@zR4#mN8&bT1*cY6^hJ3%")).unwrap()
    }

    fn customer() -> Identity {
        Identity {
            user_id: UserId::new(7),
            subject: Email::parse("a@b.com").unwrap(),
            role: Role::Customer,
        }
    }

    fn flip_signature_byte(token: &str) -> String {
        let (signing_input, signature_b64) = token.rsplit_once('.').unwrap();
        let mut signature = URL_SAFE_NO_PAD.decode(signature_b64).unwrap();
        signature[0] ^= 0x01;
        format!("{signing_input}.{}", URL_SAFE_NO_PAD.encode(signature))
    }

    #[test]
    fn test_round_trip_before_expiry() {
        let now = Utc::now();
        let token = codec().issue_at(&customer(), now).unwrap();

        let identity = codec().verify_at(&token, now + Duration::hours(23)).unwrap();
        assert_eq!(identity, customer());
        assert_eq!(identity.subject.as_str(), "a@b.com");
        assert_eq!(identity.role, Role::Customer);
    }

    #[test]
    fn test_expired_after_ttl() {
        let now = Utc::now();
        let token = codec().issue_at(&customer(), now).unwrap();

        assert_eq!(
            codec().verify_at(&token, now + TOKEN_TTL),
            Err(TokenError::Expired)
        );
        assert_eq!(
            codec().verify_at(&token, now + Duration::days(30)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_altered_signature_is_rejected() {
        let token = codec().issue(&customer()).unwrap();
        assert_eq!(
            codec().verify(&flip_signature_byte(&token)),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_other_key_is_rejected() {
        let token = codec().issue(&customer()).unwrap();
        let other = TokenCodec::new(&SecretString::from("Zq8#Lm3!Rt6$Wv1@Xy4%Nb7^Kc2&Hd5*")).unwrap();
        assert_eq!(other.verify(&token), Err(TokenError::BadSignature));
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let token = codec().issue(&customer()).unwrap();
        let mut parts: Vec<&str> = token.split('.').collect();
        let forged = encode_json(&Claims {
            sub: Email::parse("a@b.com").unwrap(),
            role: Role::Admin,
            uid: UserId::new(7),
            iat: 0,
            exp: i64::MAX,
        })
        .unwrap();
        parts[1] = &forged;
        assert_eq!(
            codec().verify(&parts.join(".")),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_malformed_tokens() {
        let codec = codec();
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.???.***"] {
            assert_eq!(codec.verify(token), Err(TokenError::Malformed), "{token}");
        }
    }

    #[test]
    fn test_other_algorithm_is_malformed() {
        let token = codec().issue(&customer()).unwrap();
        let (_, rest) = token.split_once('.').unwrap();
        let none_header = encode_json(&Header {
            alg: "none".to_owned(),
            typ: "JWT".to_owned(),
        })
        .unwrap();
        assert_eq!(
            codec().verify(&format!("{none_header}.{rest}")),
            Err(TokenError::Malformed)
        );
    }

    #[test]
    fn test_unserializable_segment_is_an_error() {
        // JSON object keys must be strings.
        let segment = std::collections::BTreeMap::from([((1, 2), "x")]);
        assert!(encode_json(&segment).is_err());
    }

    #[test]
    fn test_debug_hides_key() {
        assert!(!format!("{:?}", codec()).contains("kP9"));
    }
}

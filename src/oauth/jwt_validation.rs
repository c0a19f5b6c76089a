// ID token verification with locally held provider keys
// Supports RSA PKCS#1 v1.5 signatures and standard claims validation

use std::fmt;

use base64::Engine as _;
use chrono::{DateTime, Utc};
use log::debug;
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::pkcs8::DecodePublicKey;
use rsa::signature::Verifier;
use rsa::RsaPublicKey;
use serde::Deserialize;
use sha2::{Sha256, Sha384, Sha512};

use crate::validation::{decode_and_parse_jwt_part, extract_audiences_from_claim};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug)]
pub enum JwtValidationError {
    SignatureInvalid,
    ClaimValidationFailed {
        claim: String,
        expected: String,
        actual: String,
    },
    MissingClaim(&'static str),
    UnsupportedAlgorithm(String),
    TokenExpired,
    TokenNotYetValid,
    TokenIssuedInFuture,
    InvalidToken(String),
    KeyDecodingFailed(String),
    CryptographicError(String),
}

impl fmt::Display for JwtValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SignatureInvalid => write!(f, "JWT signature verification failed"),
            Self::ClaimValidationFailed {
                claim,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "Claim '{claim}' validation failed: expected '{expected}', got '{actual}'"
                )
            }
            Self::MissingClaim(claim) => write!(f, "Required claim '{claim}' is missing"),
            Self::UnsupportedAlgorithm(alg) => write!(f, "Unsupported algorithm: {alg}"),
            Self::TokenExpired => write!(f, "Token has expired"),
            Self::TokenNotYetValid => write!(f, "Token is not yet valid"),
            Self::TokenIssuedInFuture => write!(f, "Token was issued in the future"),
            Self::InvalidToken(msg) => write!(f, "Invalid token: {msg}"),
            Self::KeyDecodingFailed(msg) => write!(f, "Failed to decode key: {msg}"),
            Self::CryptographicError(msg) => write!(f, "Cryptographic error: {msg}"),
        }
    }
}

impl std::error::Error for JwtValidationError {}

// ============================================================================
// JWT Structures
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct JwtHeader {
    pub alg: String,
    pub kid: Option<String>,
}

/// Claims read from a verified ID token
#[derive(Debug, Clone, Deserialize)]
pub struct IdTokenClaims {
    pub iss: Option<String>,            // Issuer
    pub aud: Option<serde_json::Value>, // Audience (can be string or array)
    #[serde(default, deserialize_with = "deserialize_numeric_date")]
    pub exp: Option<i64>, // Expiration time
    #[serde(default, deserialize_with = "deserialize_numeric_date")]
    pub nbf: Option<i64>, // Not before
    #[serde(default, deserialize_with = "deserialize_numeric_date")]
    pub iat: Option<i64>, // Issued at
    pub sub: Option<String>,            // Subject
    pub nonce: Option<String>,
}

/// Read a NumericDate claim, which may be an integer or a fractional number
/// of seconds. Fractions are truncated toward the earlier second.
fn deserialize_numeric_date<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let Some(number) = Option::<serde_json::Number>::deserialize(deserializer)? else {
        return Ok(None);
    };

    if let Some(seconds) = number.as_i64() {
        return Ok(Some(seconds));
    }
    match number.as_f64() {
        #[allow(clippy::cast_possible_truncation)]
        Some(seconds) if seconds.is_finite() => Ok(Some(seconds.floor() as i64)),
        _ => Err(serde::de::Error::custom(format!("NumericDate out of range: {number}"))),
    }
}

/// Signature algorithms accepted for ID tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    Rs256,
    Rs384,
    Rs512,
}

impl SigningAlgorithm {
    /// Map a JOSE `alg` value, rejecting anything but RS256/RS384/RS512
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedAlgorithm` for any other value, including `none`
    pub fn from_jose(alg: &str) -> Result<Self, JwtValidationError> {
        match alg {
            "RS256" => Ok(Self::Rs256),
            "RS384" => Ok(Self::Rs384),
            "RS512" => Ok(Self::Rs512),
            other => Err(JwtValidationError::UnsupportedAlgorithm(other.to_string())),
        }
    }

    #[must_use]
    pub const fn as_jose(self) -> &'static str {
        match self {
            Self::Rs256 => "RS256",
            Self::Rs384 => "RS384",
            Self::Rs512 => "RS512",
        }
    }
}

// ============================================================================
// JWT Validator
// ============================================================================

/// Verifies compact-serialized ID tokens against a PEM public key
#[derive(Debug, Clone)]
pub struct JwtValidator {
    clock_skew_seconds: i64,
}

impl JwtValidator {
    /// Create a validator tolerating `clock_skew_seconds` on time claims
    #[must_use]
    pub fn new(clock_skew_seconds: u64) -> Self {
        Self {
            clock_skew_seconds: i64::try_from(clock_skew_seconds).unwrap_or(i64::MAX),
        }
    }

    #[must_use]
    pub fn clock_skew_seconds(&self) -> i64 {
        self.clock_skew_seconds
    }

    /// Verify signature, audience and validity window of an ID token
    ///
    /// Nothing from the payload is trusted before the signature checks out.
    ///
    /// # Errors
    /// Returns error if the token is malformed, uses an unsupported algorithm,
    /// fails signature verification, is outside its validity window, or is not
    /// addressed to `expected_audience`
    pub fn validate_id_token(
        &self,
        token: &str,
        public_key_pem: &str,
        expected_audience: &str,
        now: DateTime<Utc>,
    ) -> Result<IdTokenClaims, JwtValidationError> {
        // Parse JWT structure
        let parts: Vec<&str> = token.split('.').collect();
        if parts.len() != 3 {
            return Err(JwtValidationError::InvalidToken(
                "Invalid JWT format".to_string(),
            ));
        }

        let header = Self::decode_jwt_header(parts[0])?;
        debug!("📋 JWT header: alg={}, kid={:?}", header.alg, header.kid);

        let algorithm = SigningAlgorithm::from_jose(&header.alg)?;
        let public_key = Self::decode_public_key(public_key_pem)?;

        let signing_input = format!("{}.{}", parts[0], parts[1]);
        let signature_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(parts[2])
            .map_err(|e| {
                JwtValidationError::InvalidToken(format!("Invalid signature encoding: {e}"))
            })?;

        Self::verify_rsa_signature(&signing_input, &signature_bytes, algorithm, public_key)?;
        debug!("✅ JWT signature verified successfully");

        let claims = Self::decode_jwt_claims(parts[1])?;
        Self::validate_time_claims(&claims, now.timestamp(), self.clock_skew_seconds)?;
        Self::validate_audience_claim(&claims, expected_audience)?;
        debug!("✅ JWT claims validated successfully");

        Ok(claims)
    }

    /// Decode JWT header from base64
    fn decode_jwt_header(header_b64: &str) -> Result<JwtHeader, JwtValidationError> {
        decode_and_parse_jwt_part(header_b64, "header").map_err(JwtValidationError::InvalidToken)
    }

    /// Decode JWT claims from base64
    fn decode_jwt_claims(claims_b64: &str) -> Result<IdTokenClaims, JwtValidationError> {
        decode_and_parse_jwt_part(claims_b64, "claims").map_err(JwtValidationError::InvalidToken)
    }

    /// Parse an SPKI (`PUBLIC KEY`) or PKCS#1 (`RSA PUBLIC KEY`) PEM document
    fn decode_public_key(pem: &str) -> Result<RsaPublicKey, JwtValidationError> {
        if pem.contains("BEGIN RSA PUBLIC KEY") {
            RsaPublicKey::from_pkcs1_pem(pem)
                .map_err(|e| JwtValidationError::KeyDecodingFailed(format!("Invalid RSA key: {e}")))
        } else {
            RsaPublicKey::from_public_key_pem(pem)
                .map_err(|e| JwtValidationError::KeyDecodingFailed(format!("Invalid RSA key: {e}")))
        }
    }

    /// Verify RSA signature (RS256, RS384, RS512)
    fn verify_rsa_signature(
        signing_input: &str,
        signature: &[u8],
        algorithm: SigningAlgorithm,
        public_key: RsaPublicKey,
    ) -> Result<(), JwtValidationError> {
        let signature = Signature::try_from(signature).map_err(|e| {
            JwtValidationError::CryptographicError(format!("Invalid signature format: {e}"))
        })?;

        let message = signing_input.as_bytes();
        let result = match algorithm {
            SigningAlgorithm::Rs256 => {
                VerifyingKey::<Sha256>::new(public_key).verify(message, &signature)
            }
            SigningAlgorithm::Rs384 => {
                VerifyingKey::<Sha384>::new(public_key).verify(message, &signature)
            }
            SigningAlgorithm::Rs512 => {
                VerifyingKey::<Sha512>::new(public_key).verify(message, &signature)
            }
        };

        result.map_err(|_| JwtValidationError::SignatureInvalid)
    }

    /// Validate expiration, issued-at and not-before claims
    fn validate_time_claims(
        claims: &IdTokenClaims,
        now: i64,
        clock_skew: i64,
    ) -> Result<(), JwtValidationError> {
        let exp = claims.exp.ok_or(JwtValidationError::MissingClaim("exp"))?;
        if now > exp.saturating_add(clock_skew) {
            return Err(JwtValidationError::TokenExpired);
        }

        let iat = claims.iat.ok_or(JwtValidationError::MissingClaim("iat"))?;
        if iat > now.saturating_add(clock_skew) {
            return Err(JwtValidationError::TokenIssuedInFuture);
        }

        if let Some(nbf) = claims.nbf {
            if now < nbf.saturating_sub(clock_skew) {
                return Err(JwtValidationError::TokenNotYetValid);
            }
        }

        Ok(())
    }

    /// Validate that the audience contains the expected client id
    fn validate_audience_claim(
        claims: &IdTokenClaims,
        expected_audience: &str,
    ) -> Result<(), JwtValidationError> {
        let token_audiences = claims
            .aud
            .as_ref()
            .map(extract_audiences_from_claim)
            .unwrap_or_default();

        if !token_audiences.iter().any(|aud| aud == expected_audience) {
            return Err(JwtValidationError::ClaimValidationFailed {
                claim: "aud".to_string(),
                expected: expected_audience.to_string(),
                actual: format!("{token_audiences:?}"),
            });
        }

        Ok(())
    }
}

impl Default for JwtValidator {
    fn default() -> Self {
        Self::new(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{TestFixtures, BE1_CROSS_VALIDATION_TOKEN};
    use crate::testing::TestTokenBuilder;
    use chrono::TimeZone;

    fn claims(exp: Option<i64>, iat: Option<i64>, nbf: Option<i64>) -> IdTokenClaims {
        IdTokenClaims {
            iss: None,
            aud: None,
            exp,
            nbf,
            iat,
            sub: None,
            nonce: None,
        }
    }

    #[test]
    fn test_cross_validation_token() {
        let frozen = Utc.with_ymd_and_hms(2023, 5, 10, 9, 0, 0).unwrap();
        let validator = JwtValidator::new(60);

        let claims = validator
            .validate_id_token(
                BE1_CROSS_VALIDATION_TOKEN,
                TestFixtures::public_key_pem(),
                "cID122dw",
                frozen,
            )
            .unwrap();

        assert_eq!(claims.iss.as_deref(), Some("https://server.example.com"));
        assert_eq!(claims.sub.as_deref(), Some("ppid12564"));
        assert_eq!(claims.nonce.as_deref(), Some("n0nc3"));
    }

    #[test]
    fn test_all_rsa_algorithms_verify() {
        let validator = JwtValidator::default();
        for algorithm in [
            SigningAlgorithm::Rs256,
            SigningAlgorithm::Rs384,
            SigningAlgorithm::Rs512,
        ] {
            let token = TestTokenBuilder::new()
                .with_algorithm(algorithm)
                .sign(TestFixtures::private_key_pem());

            let result = validator.validate_id_token(
                &token,
                TestFixtures::public_key_pem(),
                "cID122dw",
                Utc::now(),
            );
            assert!(result.is_ok(), "{} failed: {:?}", algorithm.as_jose(), result);
        }
    }

    #[test]
    fn test_pkcs1_public_key_accepted() {
        let token = TestTokenBuilder::new().sign(TestFixtures::private_key_pem());
        let result = JwtValidator::default().validate_id_token(
            &token,
            TestFixtures::public_key_pkcs1_pem(),
            "cID122dw",
            Utc::now(),
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_foreign_key_signature_rejected() {
        let token = TestTokenBuilder::new().sign(TestFixtures::other_private_key_pem());
        let result = JwtValidator::default().validate_id_token(
            &token,
            TestFixtures::public_key_pem(),
            "cID122dw",
            Utc::now(),
        );
        assert!(matches!(result, Err(JwtValidationError::SignatureInvalid)));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let token = TestTokenBuilder::new().sign(TestFixtures::private_key_pem());
        let forged_claims = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .encode(br#"{"aud":"cID122dw","sub":"admin","exp":9999999999,"iat":0}"#);
        let parts: Vec<&str> = token.split('.').collect();
        let forged = format!("{}.{}.{}", parts[0], forged_claims, parts[2]);

        let result = JwtValidator::default().validate_id_token(
            &forged,
            TestFixtures::public_key_pem(),
            "cID122dw",
            Utc::now(),
        );
        assert!(matches!(result, Err(JwtValidationError::SignatureInvalid)));
    }

    #[test]
    fn test_unsupported_algorithms() {
        assert!(matches!(
            SigningAlgorithm::from_jose("HS256"),
            Err(JwtValidationError::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            SigningAlgorithm::from_jose("none"),
            Err(JwtValidationError::UnsupportedAlgorithm(_))
        ));
        assert!(matches!(
            SigningAlgorithm::from_jose("ES256"),
            Err(JwtValidationError::UnsupportedAlgorithm(_))
        ));

        let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
        let header = engine.encode(br#"{"alg":"none"}"#);
        let payload = engine.encode(br#"{"aud":"cID122dw"}"#);
        let unsigned = format!("{header}.{payload}.");
        let result = JwtValidator::default().validate_id_token(
            &unsigned,
            TestFixtures::public_key_pem(),
            "cID122dw",
            Utc::now(),
        );
        assert!(matches!(result, Err(JwtValidationError::UnsupportedAlgorithm(_))));
    }

    #[test]
    fn test_invalid_key_rejected() {
        let token = TestTokenBuilder::new().sign(TestFixtures::private_key_pem());
        let result = JwtValidator::default().validate_id_token(
            &token,
            "-----BEGIN PUBLIC KEY-----\nnot a key\n-----END PUBLIC KEY-----\n",
            "cID122dw",
            Utc::now(),
        );
        assert!(matches!(result, Err(JwtValidationError::KeyDecodingFailed(_))));
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let validator = JwtValidator::default();
        for token in ["", "only.two", "a.b.c.d", "not-base64!.x.y"] {
            let result = validator.validate_id_token(
                token,
                TestFixtures::public_key_pem(),
                "aud",
                Utc::now(),
            );
            assert!(
                matches!(result, Err(JwtValidationError::InvalidToken(_))),
                "token {token:?} gave {result:?}"
            );
        }
    }

    #[test]
    fn test_validate_time_claims_helper() {
        let now = Utc::now().timestamp();
        let check = |exp, iat, nbf| {
            JwtValidator::validate_time_claims(&claims(exp, iat, nbf), now, 60)
        };

        // Valid window
        assert!(check(Some(now + 3600), Some(now), None).is_ok());

        // Expired beyond leeway
        assert!(matches!(
            check(Some(now - 61), Some(now - 3600), None),
            Err(JwtValidationError::TokenExpired)
        ));

        // Expired within leeway still passes
        assert!(check(Some(now - 30), Some(now - 3600), None).is_ok());

        // Issued in the future
        assert!(matches!(
            check(Some(now + 7200), Some(now + 3600), None),
            Err(JwtValidationError::TokenIssuedInFuture)
        ));

        // Not yet valid
        assert!(matches!(
            check(Some(now + 7200), Some(now), Some(now + 1000)),
            Err(JwtValidationError::TokenNotYetValid)
        ));

        // Missing exp / iat
        assert!(matches!(
            check(None, Some(now), None),
            Err(JwtValidationError::MissingClaim("exp"))
        ));
        assert!(matches!(
            check(Some(now + 60), None, None),
            Err(JwtValidationError::MissingClaim("iat"))
        ));
    }

    #[test]
    fn test_validate_audience_claim_helper() {
        let mut single = claims(None, None, None);
        single.aud = Some(serde_json::Value::String("expected-client".to_string()));
        assert!(JwtValidator::validate_audience_claim(&single, "expected-client").is_ok());

        let mut multiple = claims(None, None, None);
        multiple.aud = Some(serde_json::json!(["other-client", "expected-client"]));
        assert!(JwtValidator::validate_audience_claim(&multiple, "expected-client").is_ok());

        let mut mismatch = claims(None, None, None);
        mismatch.aud = Some(serde_json::Value::String("other-client".to_string()));
        assert!(matches!(
            JwtValidator::validate_audience_claim(&mismatch, "expected-client"),
            Err(JwtValidationError::ClaimValidationFailed { .. })
        ));

        let missing = claims(None, None, None);
        assert!(JwtValidator::validate_audience_claim(&missing, "expected-client").is_err());
    }

    #[test]
    fn test_fractional_numeric_dates() {
        let claims: IdTokenClaims = serde_json::from_value(serde_json::json!({
            "exp": 1_683_710_989.5,
            "iat": 1_683_707_389,
            "nbf": 1_683_707_388.999
        }))
        .unwrap();

        assert_eq!(claims.exp, Some(1_683_710_989));
        assert_eq!(claims.iat, Some(1_683_707_389));
        assert_eq!(claims.nbf, Some(1_683_707_388));

        let missing: IdTokenClaims = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(missing.exp, None);

        let invalid = serde_json::from_value::<IdTokenClaims>(serde_json::json!({"exp": "soon"}));
        assert!(invalid.is_err());
    }

    #[test]
    fn test_fractional_exp_token_accepted() {
        let now = Utc::now();
        #[allow(clippy::cast_precision_loss)]
        let exp = now.timestamp() as f64 + 3600.5;
        let token = TestTokenBuilder::new()
            .with_claim("exp", serde_json::json!(exp))
            .sign(TestFixtures::private_key_pem());

        let claims = JwtValidator::default()
            .validate_id_token(&token, TestFixtures::public_key_pem(), "cID122dw", now)
            .unwrap();
        assert_eq!(claims.exp, Some(now.timestamp() + 3600));
    }

    #[test]
    fn test_expired_token_rejected_end_to_end() {
        let now = Utc::now();
        let token = TestTokenBuilder::new()
            .issued_at(now.timestamp() - 7200)
            .expires_at(now.timestamp() - 3600)
            .sign(TestFixtures::private_key_pem());

        let result = JwtValidator::new(60).validate_id_token(
            &token,
            TestFixtures::public_key_pem(),
            "cID122dw",
            now,
        );
        assert!(matches!(result, Err(JwtValidationError::TokenExpired)));
    }
}

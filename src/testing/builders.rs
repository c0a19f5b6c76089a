//! Fluent builder for signed test ID tokens
//!
//! Defaults mirror the PoP cross-validation token, with `iat` set to now and
//! a one hour lifetime.

use base64::Engine as _;
use chrono::Utc;
use rsa::pkcs1v15::SigningKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use serde_json::{json, Map, Value};
use sha2::{Sha256, Sha384, Sha512};

use crate::oauth::jwt_validation::SigningAlgorithm;

use super::constants::{TEST_CLIENT_ID, TEST_ISSUER, TEST_NONCE, TEST_SUBJECT};

/// Builder for ID tokens signed with a fixture key
#[derive(Debug, Clone)]
pub struct TestTokenBuilder {
    algorithm: SigningAlgorithm,
    claims: Map<String, Value>,
}

impl TestTokenBuilder {
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("aud".to_string(), json!(TEST_CLIENT_ID));
        claims.insert("iss".to_string(), json!(TEST_ISSUER));
        claims.insert("nonce".to_string(), json!(TEST_NONCE));
        claims.insert("sub".to_string(), json!(TEST_SUBJECT));
        claims.insert("iat".to_string(), json!(now));
        claims.insert("auth_time".to_string(), json!(now));
        claims.insert("exp".to_string(), json!(now + 3600));

        Self {
            algorithm: SigningAlgorithm::Rs256,
            claims,
        }
    }

    #[must_use]
    pub fn with_algorithm(mut self, algorithm: SigningAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    #[must_use]
    pub fn with_audience(self, audience: &str) -> Self {
        self.with_claim("aud", json!(audience))
    }

    #[must_use]
    pub fn with_audiences(self, audiences: &[&str]) -> Self {
        self.with_claim("aud", json!(audiences))
    }

    #[must_use]
    pub fn with_issuer(self, issuer: &str) -> Self {
        self.with_claim("iss", json!(issuer))
    }

    #[must_use]
    pub fn with_nonce(self, nonce: &str) -> Self {
        self.with_claim("nonce", json!(nonce))
    }

    #[must_use]
    pub fn without_nonce(self) -> Self {
        self.without_claim("nonce")
    }

    #[must_use]
    pub fn with_subject(self, subject: &str) -> Self {
        self.with_claim("sub", json!(subject))
    }

    #[must_use]
    pub fn without_subject(self) -> Self {
        self.without_claim("sub")
    }

    #[must_use]
    pub fn issued_at(self, timestamp: i64) -> Self {
        self.with_claim("iat", json!(timestamp))
    }

    #[must_use]
    pub fn expires_at(self, timestamp: i64) -> Self {
        self.with_claim("exp", json!(timestamp))
    }

    #[must_use]
    pub fn not_before(self, timestamp: i64) -> Self {
        self.with_claim("nbf", json!(timestamp))
    }

    #[must_use]
    pub fn with_claim(mut self, name: &str, value: Value) -> Self {
        self.claims.insert(name.to_string(), value);
        self
    }

    #[must_use]
    pub fn without_claim(mut self, name: &str) -> Self {
        self.claims.remove(name);
        self
    }

    /// Sign the token with a PKCS#8 private key
    ///
    /// # Panics
    ///
    /// Panics if the key is not a valid PKCS#8 RSA private key
    #[must_use]
    pub fn sign(&self, private_key_pem: &str) -> String {
        let key = RsaPrivateKey::from_pkcs8_pem(private_key_pem)
            .expect("fixture private key should parse");
        let signing_input = self.signing_input(self.algorithm.as_jose());

        let signature = match self.algorithm {
            SigningAlgorithm::Rs256 => SigningKey::<Sha256>::new(key)
                .sign(signing_input.as_bytes())
                .to_vec(),
            SigningAlgorithm::Rs384 => SigningKey::<Sha384>::new(key)
                .sign(signing_input.as_bytes())
                .to_vec(),
            SigningAlgorithm::Rs512 => SigningKey::<Sha512>::new(key)
                .sign(signing_input.as_bytes())
                .to_vec(),
        };

        format!("{signing_input}.{}", encode_segment(&signature))
    }

    /// Produce a token whose header names `alg` and whose signature segment is
    /// arbitrary bytes, for algorithm-confusion tests
    #[must_use]
    pub fn with_forged_header(&self, alg: &str) -> String {
        let signing_input = self.signing_input(alg);
        format!("{signing_input}.{}", encode_segment(b"forged-signature"))
    }

    fn signing_input(&self, alg: &str) -> String {
        let header = json!({ "alg": alg, "typ": "JWT" });
        format!(
            "{}.{}",
            encode_segment(header.to_string().as_bytes()),
            encode_segment(Value::Object(self.claims.clone()).to_string().as_bytes())
        )
    }
}

impl Default for TestTokenBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn encode_segment(bytes: &[u8]) -> String {
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

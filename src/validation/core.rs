//! Validation utilities shared by the callback validator and token verification
//!
//! Small, pure helpers for parameter presence checks and JWT part decoding.

use serde::de::DeserializeOwned;
use serde_json::Value;

// ===============================
// PARAMETER EXTRACTION
// ===============================

/// Return the parameter value if it is present and not blank
///
/// Blank values (empty or whitespace only) are treated as missing, so a
/// callback cannot satisfy the presence check with `state=`.
///
/// # Example
///
/// ```rust
/// use popcha_rp::validation::extract_required_param;
///
/// assert_eq!(extract_required_param(Some("abc")), Some("abc"));
/// assert_eq!(extract_required_param(Some("  ")), None);
/// assert_eq!(extract_required_param(None), None);
/// ```
#[must_use]
pub fn extract_required_param(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// ===============================
// JWT HELPERS
// ===============================

/// Decode a base64url JWT segment and parse it as JSON
///
/// # Arguments
///
/// * `encoded_data` - The base64url-encoded segment (no padding)
/// * `data_type` - Segment name used in error messages (`"header"`, `"claims"`)
///
/// # Errors
///
/// Returns an error if base64 decoding or JSON parsing fails
pub fn decode_and_parse_jwt_part<T: DeserializeOwned>(
    encoded_data: &str,
    data_type: &str,
) -> Result<T, String> {
    use base64::Engine as _;

    let decoded_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(encoded_data)
        .map_err(|e| format!("Invalid {data_type} encoding: {e}"))?;

    serde_json::from_slice(&decoded_bytes).map_err(|e| format!("Invalid {data_type} JSON: {e}"))
}

/// Extract string or array audiences from JWT claims
///
/// # Returns
///
/// A vector of audience strings (empty if no valid audiences found)
#[must_use]
pub fn extract_audiences_from_claim(aud_claim: &Value) -> Vec<String> {
    match aud_claim {
        Value::String(aud) => vec![aud.clone()],
        Value::Array(auds) => auds
            .iter()
            .filter_map(|v| v.as_str().map(ToString::to_string))
            .collect(),
        _ => vec![],
    }
}

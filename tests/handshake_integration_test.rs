// End-to-end handshake tests: authorization request, signed callback, verdict
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use popcha_rp::oauth::{AuthorizationRequestBuilder, CallbackParams, StaticProviderRegistry};
use popcha_rp::settings::{ApplicationSettings, RelyingPartySettings};
use popcha_rp::store::{AttemptStore, InMemoryAttemptStore};
use popcha_rp::testing::constants::{TEST_CLIENT_ID, TEST_ISSUER};
use popcha_rp::testing::{TestFixtures, TestTokenBuilder, BE1_CROSS_VALIDATION_TOKEN};
use popcha_rp::{PendingAttempt, RejectionReason, RelyingParty};
use url::Url;

struct IssuedRequest {
    nonce: String,
    state: String,
}

fn issue_request(relying_party: &RelyingParty) -> IssuedRequest {
    let url = relying_party
        .begin_login(TEST_ISSUER)
        .expect("registered issuer should build a URL");
    let params: HashMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    IssuedRequest {
        nonce: params["nonce"].clone(),
        state: params["state"].clone(),
    }
}

fn callback(id_token: &str, state: &str) -> CallbackParams {
    CallbackParams::from_pairs([
        ("id_token", id_token),
        ("token_type", "bearer"),
        ("state", state),
    ])
}

#[test]
fn test_successful_login() {
    let (relying_party, store) = TestFixtures::relying_party_with_store();
    let request = issue_request(&relying_party);

    let token = TestTokenBuilder::new()
        .with_nonce(&request.nonce)
        .sign(TestFixtures::private_key_pem());
    let subject = relying_party
        .complete_login(&callback(&token, &request.state))
        .expect("valid callback should succeed");

    assert_eq!(subject.as_str(), "ppid12564@https://server.example.com");
    assert!(store.is_empty());
}

#[test]
fn test_wrong_audience_rejected() {
    let relying_party = TestFixtures::relying_party();
    let request = issue_request(&relying_party);

    let token = TestTokenBuilder::new()
        .with_nonce(&request.nonce)
        .with_audience("other-client")
        .sign(TestFixtures::private_key_pem());

    assert_eq!(
        relying_party.complete_login(&callback(&token, &request.state)),
        Err(RejectionReason::TokenVerificationFailed)
    );
}

#[test]
fn test_second_callback_is_replay() {
    let relying_party = TestFixtures::relying_party();
    let request = issue_request(&relying_party);
    let token = TestTokenBuilder::new()
        .with_nonce(&request.nonce)
        .sign(TestFixtures::private_key_pem());
    let params = callback(&token, &request.state);

    assert!(relying_party.complete_login(&params).is_ok());
    for _ in 0..3 {
        assert_eq!(
            relying_party.complete_login(&params),
            Err(RejectionReason::UnknownOrReplayedState)
        );
    }
}

#[test]
fn test_nonce_from_another_attempt_rejected() {
    let relying_party = TestFixtures::relying_party();
    let first = issue_request(&relying_party);
    let second = issue_request(&relying_party);

    // Correctly signed for this client, but bound to the other attempt
    let token = TestTokenBuilder::new()
        .with_nonce(&first.nonce)
        .sign(TestFixtures::private_key_pem());

    assert_eq!(
        relying_party.complete_login(&callback(&token, &second.state)),
        Err(RejectionReason::NonceMismatch)
    );
}

#[test]
fn test_issuer_binding() {
    let store = Arc::new(InMemoryAttemptStore::new());
    // Both providers share the fixture key; only the recorded issuer differs
    let registry = StaticProviderRegistry::new([
        TestFixtures::provider_entry(),
        popcha_rp::ProviderEntry::new(
            "https://other.example.com",
            "hint",
            TestFixtures::public_key_pem(),
        ),
    ]);
    let relying_party = RelyingParty::new(TestFixtures::settings(), Arc::new(registry), store);

    let url = relying_party.begin_login("https://other.example.com").unwrap();
    let params: HashMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    // Signed with the key registered for other.example.com, claiming server.example.com
    let token = TestTokenBuilder::new()
        .with_nonce(&params["nonce"])
        .with_issuer(TEST_ISSUER)
        .sign(TestFixtures::private_key_pem());

    assert_eq!(
        relying_party.complete_login(&callback(&token, &params["state"])),
        Err(RejectionReason::IssuerMismatch)
    );
}

#[test]
fn test_forged_signature_rejected() {
    let relying_party = TestFixtures::relying_party();
    let request = issue_request(&relying_party);
    let token = TestTokenBuilder::new()
        .with_nonce(&request.nonce)
        .sign(TestFixtures::other_private_key_pem());

    assert_eq!(
        relying_party.complete_login(&callback(&token, &request.state)),
        Err(RejectionReason::TokenVerificationFailed)
    );
}

#[test]
fn test_missing_token_type_keeps_attempt() {
    let (relying_party, store) = TestFixtures::relying_party_with_store();
    let request = issue_request(&relying_party);
    let token = TestTokenBuilder::new()
        .with_nonce(&request.nonce)
        .sign(TestFixtures::private_key_pem());

    let query = format!("id_token={token}&state={}", request.state);
    assert_eq!(
        relying_party.complete_login_query(&query),
        Err(RejectionReason::MissingParameter)
    );
    assert!(store.contains(&request.state));

    let query = format!("{query}&token_type=bearer");
    assert!(relying_party.complete_login_query(&query).is_ok());
}

#[test]
fn test_stale_attempt_rejected() {
    let (relying_party, store) = TestFixtures::relying_party_with_store();
    let issued_at = Utc::now() - Duration::minutes(10);
    let url = relying_party.begin_login_at(TEST_ISSUER, issued_at).unwrap();
    let params: HashMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    let token = TestTokenBuilder::new()
        .with_nonce(&params["nonce"])
        .sign(TestFixtures::private_key_pem());

    assert_eq!(
        relying_party.complete_login(&callback(&token, &params["state"])),
        Err(RejectionReason::AttemptExpired)
    );
    assert!(store.is_empty());
}

#[test]
fn test_cross_validation_token() {
    let store = Arc::new(InMemoryAttemptStore::new());
    let relying_party = RelyingParty::new(
        TestFixtures::settings(),
        Arc::new(TestFixtures::registry()),
        store.clone(),
    );
    let frozen = Utc.with_ymd_and_hms(2023, 5, 10, 9, 0, 0).unwrap();
    store.put(PendingAttempt::new("be1-state", "n0nc3", TEST_ISSUER, frozen));

    let subject = relying_party
        .complete_login_at(&callback(BE1_CROSS_VALIDATION_TOKEN, "be1-state"), frozen)
        .expect("cross-validation token should verify at its issuance time");

    assert_eq!(subject.as_str(), "ppid12564@https://server.example.com");

    // The same token long after expiry
    store.put(PendingAttempt::new("be1-late", "n0nc3", TEST_ISSUER, Utc::now()));
    assert_eq!(
        relying_party.complete_login(&callback(BE1_CROSS_VALIDATION_TOKEN, "be1-late")),
        Err(RejectionReason::TokenVerificationFailed)
    );
}

#[test]
fn test_golden_authorization_url() {
    let store = Arc::new(InMemoryAttemptStore::new());
    let builder = AuthorizationRequestBuilder::new(store.clone(), &ApplicationSettings::default());

    let url: Url = builder
        .build_authorization_url(
            "server.example",
            "custom_lao_id",
            "custom_client_id",
            "https://127.0.0.1:8000",
        )
        .unwrap();

    let nonces: Vec<String> = url
        .query_pairs()
        .filter(|(k, _)| k == "nonce")
        .map(|(_, v)| v.into_owned())
        .collect();
    let states: Vec<String> = url
        .query_pairs()
        .filter(|(k, _)| k == "state")
        .map(|(_, v)| v.into_owned())
        .collect();
    assert_eq!(nonces.len(), 1);
    assert_eq!(states.len(), 1);

    assert_eq!(
        url.as_str(),
        format!(
            "https://server.example/authorize?response_mode=query&response_type=id_token\
             &client_id=custom_client_id&redirect_uri=https%3A%2F%2F127.0.0.1%3A8000%2Fcb\
             &scope=openid+profile&login_hint=custom_lao_id&nonce={}&state={}",
            nonces[0], states[0]
        )
    );

    let attempt = store.take_once(&states[0]).expect("attempt should be recorded");
    assert_eq!(attempt.nonce, nonces[0]);
    assert_eq!(attempt.expected_issuer, "https://server.example");
}

#[test]
fn test_settings_configured_provider_completes_login() {
    let mut settings = TestFixtures::settings();
    settings.providers[0].issuer = "server.example.com".to_string();
    let relying_party = RelyingParty::from_settings(settings);

    let url = relying_party.begin_login("server.example.com").unwrap();
    assert!(url
        .as_str()
        .starts_with("https://server.example.com/authorize?"));
    let params: HashMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    // Provider tokens name the issuer by URL, not by bare domain
    let token = TestTokenBuilder::new()
        .with_nonce(&params["nonce"])
        .with_issuer("https://server.example.com")
        .sign(TestFixtures::private_key_pem());

    let subject = relying_party
        .complete_login(&callback(&token, &params["state"]))
        .expect("settings-configured provider should complete the handshake");
    assert_eq!(subject.as_str(), "ppid12564@https://server.example.com");

    // The issuer URL names the same provider
    assert!(relying_party.begin_login("https://server.example.com").is_ok());
}

#[test]
fn test_settings_configured_provider_rejects_bare_domain_iss() {
    let mut settings = TestFixtures::settings();
    settings.providers[0].issuer = "server.example.com".to_string();
    let relying_party = RelyingParty::from_settings(settings);

    let url = relying_party.begin_login("server.example.com").unwrap();
    let params: HashMap<String, String> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    let token = TestTokenBuilder::new()
        .with_nonce(&params["nonce"])
        .with_issuer("server.example.com")
        .sign(TestFixtures::private_key_pem());

    assert_eq!(
        relying_party.complete_login(&callback(&token, &params["state"])),
        Err(RejectionReason::IssuerMismatch)
    );
}

#[test]
fn test_settings_driven_relying_party() {
    let toml = format!(
        r#"
[application]
client_id = "{TEST_CLIENT_ID}"
callback_base_url = "https://rp.example"

[validation]
clock_skew_seconds = 30

[[providers]]
issuer = "server.example"
login_hint = "fzJSZjKf-2cbXH7kds9H8NORuuFIRLkevJlN7qQemjo="
public_key = """{}"""

[[providers]]
issuer = "https://unchecked.example"
login_hint = "fzJSZjKf-2cbXH7kds9H8NORuuFIRLkevJlN7qQemjo="
public_key = """{}"""
"#,
        TestFixtures::public_key_pem(),
        TestFixtures::public_key_pem()
    );
    let settings = RelyingPartySettings::from_toml_str(&toml).unwrap();
    let relying_party = RelyingParty::from_settings(settings);

    let url = relying_party.begin_login("server.example").unwrap();
    assert!(url.as_str().starts_with("https://server.example/authorize?"));
    assert!(url
        .as_str()
        .contains("redirect_uri=https%3A%2F%2Frp.example%2Fcb"));

    // Issuers with a scheme fail the registry's shape checks
    assert!(relying_party.begin_login("https://unchecked.example").is_err());
}

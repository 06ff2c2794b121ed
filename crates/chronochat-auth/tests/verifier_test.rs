use chrono::{Duration as ChronoDuration, Utc};
use chronochat_auth::{AuthError, JwtSignatureVerifier, TokenVerifier, TokenVerifierConfig};
use chronochat_cache::MemoryCache;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use std::sync::Arc;

const ISSUER: &str = "https://clerk.chronochat.test";
const PRIVATE_PEM: &[u8] = include_bytes!("fixtures/issuer_private.pem");
const PUBLIC_PEM: &[u8] = include_bytes!("fixtures/issuer_public.pem");
const OTHER_PRIVATE_PEM: &[u8] = include_bytes!("fixtures/other_private.pem");

fn sign(claims: &Value, pem: &[u8]) -> String {
    jsonwebtoken::encode(
        &Header::new(Algorithm::RS256),
        claims,
        &EncodingKey::from_rsa_pem(pem).unwrap(),
    )
    .unwrap()
}

fn claims_expiring_in(seconds: i64) -> Value {
    let now = Utc::now().timestamp();
    json!({
        "sub": "user_2abc",
        "iss": ISSUER,
        "iat": now - 10,
        "exp": now + seconds,
        "sid": "sess_1",
    })
}

fn verifier() -> (TokenVerifier, Arc<MemoryCache>) {
    let cache = Arc::new(MemoryCache::new());
    let signature = Arc::new(JwtSignatureVerifier::rsa_pem(PUBLIC_PEM).unwrap());
    let verifier = TokenVerifier::new(
        signature,
        cache.clone(),
        TokenVerifierConfig::default().with_issuer(ISSUER),
    );
    (verifier, cache)
}

#[tokio::test]
async fn test_valid_token_returns_claims_and_caches() {
    let (verifier, cache) = verifier();
    let token = sign(&claims_expiring_in(3600), PRIVATE_PEM);

    let claims = verifier.verify(&token).await.unwrap();
    assert_eq!(claims.subject, "user_2abc");
    assert_eq!(claims.issuer.as_deref(), Some(ISSUER));
    assert_eq!(claims.session_id.as_deref(), Some("sess_1"));
    assert_eq!(cache.len(), 1);

    // second call is served from the cache and yields identical claims
    assert_eq!(verifier.verify(&token).await.unwrap(), claims);
}

#[tokio::test]
async fn test_wrong_key_is_invalid_signature() {
    let (verifier, _) = verifier();
    let token = sign(&claims_expiring_in(3600), OTHER_PRIVATE_PEM);
    assert_eq!(verifier.verify(&token).await, Err(AuthError::InvalidSignature));
}

#[tokio::test]
async fn test_tampered_payload_is_invalid_signature() {
    let (verifier, _) = verifier();
    let genuine = sign(&claims_expiring_in(3600), PRIVATE_PEM);
    let mut forged_claims = claims_expiring_in(3600);
    forged_claims["sub"] = json!("user_admin");
    let forged = sign(&forged_claims, OTHER_PRIVATE_PEM);

    let genuine_parts: Vec<&str> = genuine.split('.').collect();
    let forged_parts: Vec<&str> = forged.split('.').collect();
    let spliced = format!("{}.{}.{}", genuine_parts[0], forged_parts[1], genuine_parts[2]);

    assert_eq!(verifier.verify(&spliced).await, Err(AuthError::InvalidSignature));
}

#[tokio::test]
async fn test_expired_token_is_rejected_and_not_cached() {
    let (verifier, cache) = verifier();
    let token = sign(&claims_expiring_in(-60), PRIVATE_PEM);

    let err = verifier.verify(&token).await.unwrap_err();
    assert_eq!(err, AuthError::Expired);
    assert!(err.requires_refresh());
    assert!(!err.is_retryable());
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_missing_exp_claim() {
    let (verifier, _) = verifier();
    let mut claims = claims_expiring_in(3600);
    claims.as_object_mut().unwrap().remove("exp");
    let token = sign(&claims, PRIVATE_PEM);

    assert_eq!(
        verifier.verify(&token).await,
        Err(AuthError::MissingClaim("exp".to_string()))
    );
}

#[tokio::test]
async fn test_wrong_issuer() {
    let (verifier, _) = verifier();
    let mut claims = claims_expiring_in(3600);
    claims["iss"] = json!("https://evil.example");
    let token = sign(&claims, PRIVATE_PEM);

    assert_eq!(verifier.verify(&token).await, Err(AuthError::InvalidIssuer));
}

#[tokio::test]
async fn test_garbage_is_malformed() {
    let (verifier, _) = verifier();
    assert!(matches!(
        verifier.verify("not-a-token").await,
        Err(AuthError::MalformedToken(_))
    ));
    assert!(matches!(
        verifier.verify("a.b.c").await,
        Err(AuthError::MalformedToken(_))
    ));
}

#[tokio::test]
async fn test_disallowed_algorithm_is_invalid_signature() {
    let (verifier, _) = verifier();
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims_expiring_in(3600),
        &EncodingKey::from_secret(b"shared"),
    )
    .unwrap();

    assert_eq!(verifier.verify(&token).await, Err(AuthError::InvalidSignature));
}

#[tokio::test]
async fn test_cached_claims_still_expire() {
    let (verifier, cache) = verifier();
    let token = sign(&claims_expiring_in(60), PRIVATE_PEM);

    verifier.verify(&token).await.unwrap();
    assert_eq!(cache.len(), 1);

    let later = Utc::now() + ChronoDuration::seconds(120);
    assert_eq!(verifier.verify_at(&token, later).await, Err(AuthError::Expired));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn test_revoked_token_is_rejected() {
    let (verifier, _) = verifier();
    let token = sign(&claims_expiring_in(3600), PRIVATE_PEM);
    verifier.verify(&token).await.unwrap();

    verifier
        .revoke(&token, Utc::now() + ChronoDuration::hours(1))
        .await
        .unwrap();

    assert_eq!(verifier.verify(&token).await, Err(AuthError::Revoked));
}

#[tokio::test]
async fn test_hmac_development_key() {
    let cache = Arc::new(MemoryCache::new());
    let verifier = TokenVerifier::new(
        Arc::new(JwtSignatureVerifier::hmac_secret(b"dev-secret").unwrap()),
        cache,
        TokenVerifierConfig::default(),
    );
    let token = jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        &claims_expiring_in(600),
        &EncodingKey::from_secret(b"dev-secret"),
    )
    .unwrap();

    assert_eq!(verifier.verify(&token).await.unwrap().subject, "user_2abc");
}

fn lenient_verifier(leeway_secs: u64) -> TokenVerifier {
    let signature = Arc::new(JwtSignatureVerifier::rsa_pem(PUBLIC_PEM).unwrap());
    TokenVerifier::new(
        signature,
        Arc::new(MemoryCache::new()),
        TokenVerifierConfig::default()
            .with_issuer(ISSUER)
            .with_leeway(std::time::Duration::from_secs(leeway_secs)),
    )
}

#[tokio::test]
async fn test_leeway_never_extends_expiry() {
    let verifier = lenient_verifier(30);
    let token = sign(&claims_expiring_in(-29), PRIVATE_PEM);

    assert_eq!(verifier.verify(&token).await, Err(AuthError::Expired));
}

#[tokio::test]
async fn test_leeway_tolerates_issuer_clock_skew() {
    let verifier = lenient_verifier(30);
    let now = Utc::now().timestamp();
    let mut skewed = claims_expiring_in(3600);
    skewed["iat"] = json!(now + 20);
    assert!(verifier.verify(&sign(&skewed, PRIVATE_PEM)).await.is_ok());

    let mut future = claims_expiring_in(3600);
    future["iat"] = json!(now + 600);
    assert!(matches!(
        verifier.verify(&sign(&future, PRIVATE_PEM)).await,
        Err(AuthError::MalformedToken(_))
    ));
}

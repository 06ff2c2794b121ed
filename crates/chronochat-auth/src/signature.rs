use crate::error::AuthError;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};

/// Checks a raw token's signature and returns its claim set
///
/// Implementations verify the signature only. Expiry, issuer and required
/// claims are checked by [`crate::TokenVerifier`].
pub trait SignatureVerifier: Send + Sync {
    fn verify_signature(&self, token: &str) -> Result<Map<String, Value>, AuthError>;
}

/// JWT signature verification with a fixed key and algorithm allow-list
pub struct JwtSignatureVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtSignatureVerifier {
    pub fn new(key: DecodingKey, algorithms: Vec<Algorithm>) -> Result<Self, AuthError> {
        if algorithms.is_empty() {
            return Err(AuthError::KeyConfiguration(
                "at least one algorithm must be allowed".into(),
            ));
        }

        let mut validation = Validation::new(algorithms[0]);
        validation.algorithms = algorithms;
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Ok(Self { key, validation })
    }

    /// RS256 with an RSA public key in PEM form
    pub fn rsa_pem(pem: &[u8]) -> Result<Self, AuthError> {
        let key = DecodingKey::from_rsa_pem(pem)
            .map_err(|e| AuthError::KeyConfiguration(e.to_string()))?;
        Self::new(key, vec![Algorithm::RS256])
    }

    /// ES256 with an EC public key in PEM form
    pub fn ec_pem(pem: &[u8]) -> Result<Self, AuthError> {
        let key = DecodingKey::from_ec_pem(pem)
            .map_err(|e| AuthError::KeyConfiguration(e.to_string()))?;
        Self::new(key, vec![Algorithm::ES256])
    }

    /// HS256 shared secret, for local development
    pub fn hmac_secret(secret: &[u8]) -> Result<Self, AuthError> {
        Self::new(DecodingKey::from_secret(secret), vec![Algorithm::HS256])
    }
}

impl SignatureVerifier for JwtSignatureVerifier {
    fn verify_signature(&self, token: &str) -> Result<Map<String, Value>, AuthError> {
        jsonwebtoken::decode::<Map<String, Value>>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                    AuthError::InvalidSignature
                }
                ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidEcdsaKey | ErrorKind::InvalidKeyFormat => {
                    AuthError::KeyConfiguration(e.to_string())
                }
                _ => AuthError::MalformedToken(e.to_string()),
            })
    }
}

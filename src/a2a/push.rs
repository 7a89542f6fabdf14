//! Push notification delivery for seller task updates.
//!
//! Each seller owns one RSA signing key generated at startup. Notifications
//! are POSTed with a short RS256 JWT whose `request_body_sha256` claim binds
//! the token to the payload; receivers fetch the public half from
//! `/.well-known/jwks.json`.

use crate::a2a::types::Task;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::traits::PublicKeyParts;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

const RSA_BITS: usize = 2048;
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Failed to generate RSA key: {0}")]
    KeyGeneration(String),

    #[error("Failed to sign notification: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),

    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Public half of the signing key in JWK form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    #[serde(rename = "use")]
    pub use_: String,
    pub alg: String,
    pub n: String,
    pub e: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwksResponse {
    pub keys: Vec<Jwk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationClaims {
    pub iat: i64,
    pub request_body_sha256: String,
}

/// Signs and delivers push notifications, and verifies receiver URLs.
#[derive(Clone)]
pub struct PushNotificationSender {
    client: reqwest::Client,
    kid: String,
    encoding_key: EncodingKey,
    jwk: Jwk,
}

impl PushNotificationSender {
    /// Generate a fresh RSA key pair. CPU heavy; call from a blocking context.
    pub fn generate() -> Result<Self, PushError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, RSA_BITS)
            .map_err(|e| PushError::KeyGeneration(e.to_string()))?;
        let public_key = RsaPublicKey::from(&private_key);

        let pem = private_key
            .to_pkcs1_pem(LineEnding::LF)
            .map_err(|e| PushError::KeyGeneration(e.to_string()))?;
        let encoding_key = EncodingKey::from_rsa_pem(pem.as_bytes())?;

        let kid = uuid::Uuid::new_v4().simple().to_string();
        let jwk = Jwk {
            kty: "RSA".to_string(),
            kid: kid.clone(),
            use_: "sig".to_string(),
            alg: "RS256".to_string(),
            n: URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be()),
        };

        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(PushError::Http)?;

        Ok(Self {
            client,
            kid,
            encoding_key,
            jwk,
        })
    }

    pub fn jwks(&self) -> JwksResponse {
        JwksResponse {
            keys: vec![self.jwk.clone()],
        }
    }

    /// Ask the receiver to echo a one-time token back, proving it owns `url`.
    pub async fn verify_url(&self, url: &str) -> bool {
        let validation_token = uuid::Uuid::new_v4().to_string();
        let result = async {
            let response = self
                .client
                .get(url)
                .query(&[("validationToken", validation_token.as_str())])
                .send()
                .await?
                .error_for_status()?;
            response.text().await
        }
        .await;

        match result {
            Ok(body) => {
                let verified = body == validation_token;
                tracing::info!("Verified push-notification URL: {} => {}", url, verified);
                verified
            }
            Err(e) => {
                tracing::warn!("Error verifying push-notification URL {}: {}", url, e);
                false
            }
        }
    }

    /// Deliver `task` to `url`. Delivery failures are logged and swallowed.
    pub async fn send(&self, url: &str, task: &Task) {
        if let Err(e) = self.try_send(url, task).await {
            tracing::warn!("Error sending push-notification to {}: {}", url, e);
        }
    }

    async fn try_send(&self, url: &str, task: &Task) -> Result<(), PushError> {
        let body = serde_json::to_value(task)?;
        let token = self.sign(&body)?;

        self.client
            .post(url)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        tracing::info!("Push-notification sent for URL: {}", url);
        Ok(())
    }

    fn sign(&self, body: &serde_json::Value) -> Result<String, PushError> {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.kid.clone());

        let claims = NotificationClaims {
            iat: chrono::Utc::now().timestamp(),
            request_body_sha256: body_sha256(body)?,
        };
        Ok(jsonwebtoken::encode(&header, &claims, &self.encoding_key)?)
    }
}

/// Hex SHA-256 of the compact, key-sorted JSON encoding of `body`.
pub fn body_sha256(body: &serde_json::Value) -> Result<String, PushError> {
    // serde_json maps are ordered, so this encoding is canonical.
    let canonical = serde_json::to_string(body)?;
    Ok(hex::encode(Sha256::digest(canonical.as_bytes())))
}

//! Shared-secret authentication for the seller JSON-RPC endpoint.
//!
//! A seller declares exactly one scheme on its agent card. `Basic` checks a
//! username/password pair, `Bearer` checks a static API key. Clients pick the
//! header format from the scheme the remote card advertises.

use crate::a2a::types::AgentCard;
use base64::{Engine, engine::general_purpose::STANDARD};
use subtle::ConstantTimeEq;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Authorization header is missing")]
    MissingHeader,

    #[error("Invalid Authorization header format")]
    MalformedHeader,

    #[error("Authentication scheme mismatch. Expected {expected}, got {got}")]
    SchemeMismatch { expected: String, got: String },

    #[error("Invalid bearer token")]
    InvalidToken,

    #[error("Invalid basic auth format")]
    InvalidBasicFormat,

    #[error("Invalid credentials")]
    InvalidCredentials,
}

/// Startup-time misconfiguration of a seller's auth.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthConfigError {
    #[error("Only one authentication scheme is supported for now")]
    TooManySchemes,

    #[error("Agent card declares no authentication scheme")]
    NoScheme,

    #[error("Authentication scheme is bearer but api_key is not defined")]
    MissingApiKey,

    #[error("Authentication scheme is basic but auth_username and auth_password are not defined")]
    MissingBasicCredentials,

    #[error("Unsupported authentication scheme: {0}")]
    Unsupported(String),
}

/// Credentials a seller checks incoming requests against.
#[derive(Clone)]
pub enum AuthScheme {
    Basic { username: String, password: String },
    Bearer { api_key: String },
}

impl std::fmt::Debug for AuthScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthScheme::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            AuthScheme::Bearer { .. } => f.debug_struct("Bearer").field("api_key", &"***").finish(),
        }
    }
}

impl AuthScheme {
    /// Build the scheme declared by `card`, validating the matching secrets exist.
    pub fn from_card(
        card: &AgentCard,
        api_key: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, AuthConfigError> {
        let schemes = card
            .authentication
            .as_ref()
            .map(|a| a.schemes.as_slice())
            .unwrap_or_default();

        if schemes.len() > 1 {
            return Err(AuthConfigError::TooManySchemes);
        }
        let scheme = schemes.first().ok_or(AuthConfigError::NoScheme)?;

        match scheme.to_lowercase().as_str() {
            "bearer" => match api_key.filter(|k| !k.is_empty()) {
                Some(key) => Ok(AuthScheme::Bearer {
                    api_key: key.to_string(),
                }),
                None => Err(AuthConfigError::MissingApiKey),
            },
            "basic" => match (
                username.filter(|u| !u.is_empty()),
                password.filter(|p| !p.is_empty()),
            ) {
                (Some(u), Some(p)) => Ok(AuthScheme::Basic {
                    username: u.to_string(),
                    password: p.to_string(),
                }),
                _ => Err(AuthConfigError::MissingBasicCredentials),
            },
            other => Err(AuthConfigError::Unsupported(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AuthScheme::Basic { .. } => "basic",
            AuthScheme::Bearer { .. } => "bearer",
        }
    }

    /// Check the raw `Authorization` header value.
    pub fn verify(&self, header: Option<&str>) -> Result<(), AuthError> {
        let header = header.ok_or(AuthError::MissingHeader)?;

        let parts: Vec<&str> = header.split_whitespace().collect();
        let [auth_type, credentials] = parts.as_slice() else {
            return Err(AuthError::MalformedHeader);
        };
        let auth_type = auth_type.to_lowercase();

        match self {
            AuthScheme::Bearer { api_key } if auth_type == "bearer" => {
                if secret_eq(credentials, api_key) {
                    Ok(())
                } else {
                    Err(AuthError::InvalidToken)
                }
            }
            AuthScheme::Basic { username, password } if auth_type == "basic" => {
                let decoded = STANDARD
                    .decode(credentials)
                    .ok()
                    .and_then(|bytes| String::from_utf8(bytes).ok())
                    .ok_or_else(|| {
                        tracing::error!("Error decoding basic auth credentials");
                        AuthError::InvalidBasicFormat
                    })?;
                let (user, pass) = decoded
                    .split_once(':')
                    .ok_or(AuthError::InvalidBasicFormat)?;

                // Evaluate both halves so timing does not reveal which one failed.
                let user_ok = secret_eq(user, username);
                let pass_ok = secret_eq(pass, password);
                if user_ok & pass_ok {
                    Ok(())
                } else {
                    Err(AuthError::InvalidCredentials)
                }
            }
            _ => Err(AuthError::SchemeMismatch {
                expected: self.name().to_string(),
                got: auth_type,
            }),
        }
    }
}

fn secret_eq(given: &str, expected: &str) -> bool {
    given.as_bytes().ct_eq(expected.as_bytes()).into()
}

/// `Authorization` header value a client should send to the agent behind `card`.
///
/// `credential` is the raw secret: an API key for bearer agents, `user:pass`
/// for basic agents. Returns `None` when the card declares no known scheme.
pub fn client_auth_header(card: &AgentCard, credential: &str) -> Option<String> {
    let scheme = card.authentication.as_ref()?.schemes.first()?.to_lowercase();
    match scheme.as_str() {
        "bearer" => Some(format!("Bearer {}", credential)),
        "basic" => Some(format!("Basic {}", STANDARD.encode(credential))),
        _ => None,
    }
}

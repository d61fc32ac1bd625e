use serde::Deserialize;

use crate::error::AuthError;
use crate::util;


const IDENTITY_LENGTH: usize = 28;


#[derive(Deserialize)]
struct SecretResponse {
    password: Option<String>,
}


/// Shared-password gate in front of the page.
///
/// Without a usable secret every attempt fails with `AuthError::Misconfigured`.
pub struct PasswordGate {
    secret: Option<String>,
}

impl PasswordGate {
    pub fn new(secret: Option<String>) -> Self {
        let secret = secret
            .map(|s| s.trim().to_owned())
            .filter(|s| !s.is_empty());

        if secret.is_none() {
            warn!("No gate password configured, every attempt will be rejected");
        }

        PasswordGate { secret }
    }

    /// Builds the gate from a secret endpoint body like `{"password": "..."}`.
    pub fn from_secret_response(body: &str) -> Self {
        match serde_json::from_str::<SecretResponse>(body) {
            Ok(res) => Self::new(res.password),
            Err(err) => {
                warn!("Malformed password secret response: {}", err);
                Self::new(None)
            },
        }
    }

    /// Fetches the secret once from a secret endpoint. Any failure leaves the
    /// gate closed.
    pub async fn fetch(http: &reqwest::Client, url: &str) -> Self {
        let res = match http.get(url).send().await {
            Ok(res) => res,
            Err(err) => {
                warn!("Fail to fetch password secret: {}", err);
                return Self::new(None);
            },
        };

        if !res.status().is_success() {
            warn!("Password secret endpoint answered {}", res.status());
            return Self::new(None);
        }

        match res.text().await {
            Ok(body) => Self::from_secret_response(&body),
            Err(err) => {
                warn!("Fail to read password secret: {}", err);
                Self::new(None)
            },
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    pub fn check(&self, attempt: &str) -> Result<(), AuthError> {
        let secret = self.secret.as_ref().ok_or(AuthError::Misconfigured)?;

        if attempt.trim() == secret {
            Ok(())
        }
        else {
            Err(AuthError::IncorrectPassword)
        }
    }
}


/// Opaque anonymous identity for a newly admitted visitor.
pub fn issue_identity() -> String {
    util::generate_rand_id(IDENTITY_LENGTH)
}

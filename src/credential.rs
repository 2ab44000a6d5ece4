use std::{env, fmt};

use reqwest::header::HeaderValue;

use crate::errors::{Result, StudioError};

pub const FAL_KEY_ENV: &str = "FAL_KEY";

/// fal.ai API key, shared read-only by every outbound call of one action.
#[derive(Clone, PartialEq, Eq)]
pub struct FalCredential(String);

impl FalCredential {
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into().trim().to_string();
        if key.is_empty() { None } else { Some(Self(key)) }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// `Authorization: Key <key>` as fal expects it.
    pub fn authorization(&self) -> Result<HeaderValue> {
        let mut value = HeaderValue::from_str(&format!("Key {}", self.expose()))
            .map_err(|_| StudioError::other("FAL_KEY 含有非法字符"))?;
        value.set_sensitive(true);
        Ok(value)
    }
}

impl fmt::Debug for FalCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FalCredential(***)")
    }
}

#[derive(Clone, Debug, Default)]
pub struct CredentialProvider {
    secret: Option<FalCredential>,
}

impl CredentialProvider {
    /// Secret store: the configured key first, then `FAL_KEY` from the environment.
    pub fn from_secret_store(configured: Option<&str>) -> Self {
        let secret = configured
            .and_then(FalCredential::new)
            .or_else(|| env::var(FAL_KEY_ENV).ok().and_then(FalCredential::new));
        Self { secret }
    }

    pub fn with_secret(secret: Option<FalCredential>) -> Self {
        Self { secret }
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    pub fn resolve(&self, user_input: Option<&str>) -> Option<FalCredential> {
        self.secret
            .clone()
            .or_else(|| user_input.and_then(FalCredential::new))
    }
}

//! Secret resolution for the store URL and the analysis API key.
//!
//! Resolution order:
//! 1. Environment variable
//! 2. Config file (with warning)
//! 3. Built-in default (store URL only)

use crate::types::{AnalysisSection, StoreConfig, defaults};

/// Environment variables checked for the store URL, in order.
pub const STORE_URL_ENV_VARS: [&str; 2] = ["DETECTIVE_REDIS_URL", "REDIS_URL"];

/// Environment variable checked for the analysis API key.
pub const API_KEY_ENV_VAR: &str = "GOOGLE_API_KEY";

/// Result of secret resolution with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Environment variable.
    EnvVar(String),
    /// Config file (plaintext).
    ConfigFile,
    /// Built-in default.
    Default,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file"),
            SecretSource::Default => write!(f, "default"),
        }
    }
}

/// Resolve the store URL from the process environment and config.
pub fn resolve_store_url(store: &StoreConfig) -> ResolvedSecret {
    resolve_store_url_with(store, |name| std::env::var(name).ok())
}

/// Resolve the store URL using `lookup` for environment variables.
pub fn resolve_store_url_with<F>(store: &StoreConfig, lookup: F) -> ResolvedSecret
where
    F: Fn(&str) -> Option<String>,
{
    for var in STORE_URL_ENV_VARS {
        if let Some(value) = lookup(var).filter(|v| !v.is_empty()) {
            return ResolvedSecret {
                value,
                source: SecretSource::EnvVar(var.to_string()),
            };
        }
    }

    match store.url.as_deref().filter(|u| !u.is_empty()) {
        Some(url) => ResolvedSecret {
            value: url.to_string(),
            source: SecretSource::ConfigFile,
        },
        None => ResolvedSecret {
            value: defaults::STORE_URL.to_string(),
            source: SecretSource::Default,
        },
    }
}

/// Resolve the analysis API key from the process environment and config.
pub fn resolve_api_key(analysis: &AnalysisSection) -> Option<ResolvedSecret> {
    resolve_api_key_with(analysis, |name| std::env::var(name).ok())
}

/// Resolve the analysis API key using `lookup` for environment variables.
pub fn resolve_api_key_with<F>(analysis: &AnalysisSection, lookup: F) -> Option<ResolvedSecret>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(API_KEY_ENV_VAR).filter(|v| !v.is_empty()) {
        return Some(ResolvedSecret {
            value,
            source: SecretSource::EnvVar(API_KEY_ENV_VAR.to_string()),
        });
    }

    analysis
        .api_key
        .as_deref()
        .filter(|k| !k.is_empty())
        .map(|k| ResolvedSecret {
            value: k.to_string(),
            source: SecretSource::ConfigFile,
        })
}

/// Hide the password component of a connection URL for display.
pub fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let (authority, path) = match rest.find('/') {
        Some(i) => rest.split_at(i),
        None => (rest, ""),
    };
    let Some((userinfo, host)) = authority.rsplit_once('@') else {
        return url.to_string();
    };
    let user = userinfo.split_once(':').map_or(userinfo, |(user, _)| user);
    format!("{scheme}://{user}:***@{host}{path}")
}

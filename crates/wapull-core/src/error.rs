use std::fmt;

use serde_json::Value;

use crate::config::ConfigError;
use crate::endpoints::Capability;
use wapull_auth_bridge::AuthError;

/// A single request against an API endpoint failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("GET {target}{} returned HTTP {status}: {body}", QueryDisplay(.params))]
    Status {
        status: u16,
        target: String,
        params: Vec<(String, String)>,
        body: Value,
    },

    #[error("GET {target}{} failed: {message}", QueryDisplay(.params))]
    Transport {
        target: String,
        params: Vec<(String, String)>,
        message: String,
    },

    #[error("GET {target}{} returned an unrecognized envelope: {body}", QueryDisplay(.params))]
    Envelope {
        target: String,
        params: Vec<(String, String)>,
        body: Value,
    },

    #[error("cannot build a request for {pattern}: no {placeholder} available")]
    Unresolved {
        pattern: String,
        placeholder: &'static str,
    },
}

impl FetchError {
    /// HTTP status, when the server answered with a non-2xx code.
    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

struct QueryDisplay<'a>(&'a [(String, String)]);

impl fmt::Display for QueryDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, key, value)?;
        }
        Ok(())
    }
}

/// One rejected candidate during endpoint discovery.
#[derive(Debug, Clone)]
pub struct ProbeAttempt {
    pub pattern: String,
    pub detail: String,
}

/// No candidate endpoint was accepted for a capability.
#[derive(Debug, Clone, thiserror::Error)]
#[error("no {capability} endpoint accepted after {}", AttemptTrail(.attempts))]
pub struct DiscoveryError {
    pub capability: Capability,
    pub attempts: Vec<ProbeAttempt>,
}

struct AttemptTrail<'a>(&'a [ProbeAttempt]);

impl fmt::Display for AttemptTrail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} attempts:", self.0.len())?;
        for (i, attempt) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, " [{}] {} -> {}", i + 1, attempt.pattern, attempt.detail)?;
        }
        Ok(())
    }
}

/// Fatal errors that abort a harvest.
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to persist artifact: {0}")]
    Artifact(#[from] std::io::Error),
}

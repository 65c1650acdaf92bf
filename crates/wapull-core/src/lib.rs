//! Endpoint discovery and resilient pagination over the SendPulse WhatsApp API.
//!
//! The account-specific API surface is not known up front, so every run:
//!
//! 1. authenticates with client credentials ([`wapull_auth_bridge`]),
//! 2. probes a ranked list of candidate paths per capability ([`discovery`]),
//! 3. drains the resolved endpoints page by page ([`paginate`]),
//! 4. flattens messages into scored rows ([`records`], [`sentiment`]).
//!
//! [`Harvester`] ties the steps together and tolerates per-chat failures.

pub mod client;
pub mod config;
pub mod discovery;
pub mod endpoints;
pub mod envelope;
pub mod error;
pub mod harvester;
pub mod paginate;
pub mod records;
pub mod sentiment;

pub use client::{ApiClient, PageFetcher};
pub use config::{ConfigError, HarvestConfig, Settings};
pub use discovery::probe;
pub use endpoints::{
    Capability, ContextIds, DateRange, EndpointCandidate, RenderedRequest, ResolvedEndpoint,
};
pub use envelope::decode_envelope;
pub use error::{DiscoveryError, FetchError, HarvestError, ProbeAttempt};
pub use harvester::{
    DiscoveryReport, HarvestObserver, HarvestOutcome, HarvestStage, Harvester, NoopObserver,
    SkippedChat,
};
pub use paginate::{paginate, PageLimits};
pub use records::{Chat, MessageRow};
pub use sentiment::{LexiconScorer, SentimentScorer};

pub use wapull_auth_bridge::{AuthError, ClientCredentials, Credential};

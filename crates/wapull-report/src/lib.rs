//! Output side of a harvest: raw JSON dumps, the per-chat summary CSV and
//! the two sentiment charts.

pub mod artifacts;
pub mod charts;
pub mod error;
pub mod summary;

pub use artifacts::{read_messages, ArtifactWriter};
pub use error::ArtifactError;
pub use summary::{sentiment_histogram, summarize, ChatSummary};

//! Endpoint discovery.

use tracing::{debug, info};

use crate::client::PageFetcher;
use crate::endpoints::{Capability, ContextIds, DateRange, EndpointCandidate, ResolvedEndpoint};
use crate::error::{DiscoveryError, ProbeAttempt};

/// Try `candidates` in order and return the first one the server accepts.
///
/// Each candidate gets a single one-item request. A decodable envelope counts
/// as acceptance even when it is empty. Candidates whose placeholders cannot
/// be filled are recorded as failed without a request.
pub async fn probe(
    fetcher: &dyn PageFetcher,
    capability: Capability,
    candidates: &[EndpointCandidate],
    ids: &ContextIds,
    dates: &DateRange,
) -> Result<ResolvedEndpoint, DiscoveryError> {
    let mut attempts = Vec::with_capacity(candidates.len());

    for (rank, candidate) in candidates.iter().enumerate() {
        let pattern = candidate.pattern();

        let request = match candidate.render(ids) {
            Ok(request) => request
                .with_query(page_params(1, 0))
                .with_query(candidate.date_params(dates)),
            Err(err) => {
                debug!("skipping {} candidate {}: {}", capability, pattern, err);
                attempts.push(ProbeAttempt {
                    pattern,
                    detail: err.to_string(),
                });
                continue;
            }
        };

        match fetcher.fetch_items(&request).await {
            Ok(items) => {
                let probe_url = format!("{}{}", fetcher.target(&request), request.query_string());
                info!(
                    "resolved {} endpoint: {} (candidate {} of {}, {} sample items)",
                    capability,
                    pattern,
                    rank + 1,
                    candidates.len(),
                    items.len()
                );
                return Ok(ResolvedEndpoint {
                    capability,
                    candidate: *candidate,
                    rank,
                    probe_url,
                });
            }
            Err(err) => {
                debug!("{} candidate {} rejected: {}", capability, pattern, err);
                attempts.push(ProbeAttempt {
                    pattern,
                    detail: err.to_string(),
                });
            }
        }
    }

    Err(DiscoveryError {
        capability,
        attempts,
    })
}

pub(crate) fn page_params(limit: usize, offset: usize) -> [(String, String); 2] {
    [
        ("limit".to_string(), limit.to_string()),
        ("offset".to_string(), offset.to_string()),
    ]
}

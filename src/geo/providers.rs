//! Geocoding providers: the `Geocoder` seam and the Nominatim client.

use super::types::{GeoError, GeocodeCandidate};
use std::time::Duration;

/// A free-text geocoding service.
pub trait Geocoder: Send + Sync {
    /// Search for `query`, returning at most `limit` raw candidates.
    fn search(
        &self,
        query: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<GeocodeCandidate>, GeoError>;
}

// ─── Nominatim provider ─────────────────────────────────────────

/// OpenStreetMap Nominatim `/search` client.
///
/// The public instance allows about one request per second and rejects
/// clients without an identifying User-Agent, so both are the caller's
/// concern: the agent is built with one, and the pipeline spaces requests.
pub struct NominatimClient {
    agent: ureq::Agent,
    base_url: String,
}

impl NominatimClient {
    pub fn new(base_url: &str, user_agent: &str) -> Self {
        let agent = ureq::AgentBuilder::new().user_agent(user_agent).build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl Geocoder for NominatimClient {
    fn search(
        &self,
        query: &str,
        limit: usize,
        timeout: Duration,
    ) -> Result<Vec<GeocodeCandidate>, GeoError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .agent
            .get(&url)
            .timeout(timeout)
            .set("Accept", "application/json")
            .set("Accept-Language", "en")
            .query("q", query)
            .query("format", "json")
            .query("limit", &limit.to_string())
            .query("addressdetails", "1")
            .call()
            .map_err(|e| GeoError::Network(e.to_string()))?;

        response
            .into_json::<Vec<GeocodeCandidate>>()
            .map_err(|e| GeoError::InvalidResponse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let client = NominatimClient::new("https://nominatim.example.org/", "test/1.0");
        assert_eq!(client.base_url, "https://nominatim.example.org");
    }

    #[test]
    fn test_unreachable_is_network_error() {
        // Port 9 on localhost: nothing listens, the connect fails fast.
        let client = NominatimClient::new("http://127.0.0.1:9", "test/1.0");
        let err = client
            .search("Chennai", 1, Duration::from_secs(2))
            .unwrap_err();
        assert!(matches!(err, GeoError::Network(_)));
    }
}

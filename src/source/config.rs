//! Upstream source configuration

use std::fmt;
use std::time::Duration;

/// Base URL of the FIRMS country CSV API
pub const FIRMS_COUNTRY_API: &str = "https://firms.modaps.eosdis.nasa.gov/api/country/csv";

/// Default cap on a downloaded payload (32 MiB)
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Where and how to fetch snapshots
///
/// Either an explicit `url` is given, or one is built from the FIRMS
/// country API using `api_key`, `product`, `country` and `day_range`.
#[derive(Clone)]
pub struct SourceConfig {
    /// Explicit URL; takes precedence over the FIRMS fields
    pub url: Option<String>,

    /// FIRMS map key
    pub api_key: Option<String>,

    /// FIRMS product (sensor + processing level)
    pub product: String,

    /// ISO-3 country code
    pub country: String,

    /// Number of days of detections to request (1..=10)
    pub day_range: u8,

    /// Per-request timeout
    pub request_timeout: Duration,

    /// Largest payload accepted; bigger responses fail the cycle
    pub max_body_bytes: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            product: "VIIRS_NOAA21_NRT".to_string(),
            country: "USA".to_string(),
            day_range: 1,
            request_timeout: Duration::from_secs(30),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl SourceConfig {
    /// Create a config for an explicit URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Default::default()
        }
    }

    /// Set the FIRMS map key
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the FIRMS product
    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = product.into();
        self
    }

    /// Set the country code
    pub fn country(mut self, country: impl Into<String>) -> Self {
        self.country = country.into();
        self
    }

    /// Set the day range, clamped to what the API accepts
    pub fn day_range(mut self, days: u8) -> Self {
        self.day_range = days.clamp(1, 10);
        self
    }

    /// Set the request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the largest payload accepted
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Resolve the URL to fetch
    ///
    /// Returns `None` when neither an explicit URL nor an API key is set.
    pub fn resolve_url(&self) -> Option<String> {
        if let Some(ref url) = self.url {
            return Some(url.clone());
        }

        self.api_key.as_ref().map(|key| {
            format!(
                "{}/{}/{}/{}/{}",
                FIRMS_COUNTRY_API, key, self.product, self.country, self.day_range
            )
        })
    }
}

// The API key is embedded in the resolved URL too, so neither is printed.
impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redacted = |set: bool| if set { "<redacted>" } else { "<unset>" };

        f.debug_struct("SourceConfig")
            .field("url", &redacted(self.url.is_some()))
            .field("api_key", &redacted(self.api_key.is_some()))
            .field("product", &self.product)
            .field("country", &self.country)
            .field("day_range", &self.day_range)
            .field("request_timeout", &self.request_timeout)
            .field("max_body_bytes", &self.max_body_bytes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SourceConfig::default();

        assert!(config.url.is_none());
        assert!(config.api_key.is_none());
        assert_eq!(config.product, "VIIRS_NOAA21_NRT");
        assert_eq!(config.country, "USA");
        assert_eq!(config.day_range, 1);
        assert_eq!(config.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
        assert!(config.resolve_url().is_none());
    }

    #[test]
    fn test_firms_url() {
        let config = SourceConfig::default()
            .api_key("abc123")
            .country("CAN")
            .day_range(2);

        assert_eq!(
            config.resolve_url().unwrap(),
            "https://firms.modaps.eosdis.nasa.gov/api/country/csv/abc123/VIIRS_NOAA21_NRT/CAN/2"
        );
    }

    #[test]
    fn test_explicit_url_wins() {
        let config = SourceConfig::with_url("http://localhost:9000/data.csv").api_key("abc123");

        assert_eq!(
            config.resolve_url().unwrap(),
            "http://localhost:9000/data.csv"
        );
    }

    #[test]
    fn test_day_range_clamped() {
        assert_eq!(SourceConfig::default().day_range(0).day_range, 1);
        assert_eq!(SourceConfig::default().day_range(30).day_range, 10);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = SourceConfig::default().api_key("super-secret");
        let printed = format!("{:?}", config);

        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }
}

//! TRIAS client configuration

use std::time::Duration;

use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::TriasError;

/// Configuration for a TRIAS endpoint and the entities polled from it
#[derive(Clone, Serialize, Deserialize)]
pub struct TriasConfig {
    /// TRIAS endpoint (e.g., <https://efa-bw.de/trias>)
    pub base_url: String,

    /// Requestor reference issued by the operator (sensitive - uses SecretString)
    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Minutes between two refresh cycles
    #[serde(default = "default_scan_interval_minutes")]
    pub scan_interval_minutes: u64,

    /// Departures fetched per stop
    #[serde(default = "default_departure_limit")]
    pub departure_limit: u32,

    /// Connections fetched per trip
    #[serde(default = "default_trip_limit")]
    pub trip_limit: u32,

    /// Single-result location searches below this probability are rejected
    #[serde(default = "default_min_match_probability")]
    pub min_match_probability: f64,

    /// IANA zone used for request times
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Stop point references to poll for departures
    #[serde(default)]
    pub stops: Vec<String>,

    /// Origin/destination pairs to poll for connections
    #[serde(default)]
    pub trips: Vec<TripConfig>,
}

/// A named connection between two stops
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripConfig {
    /// Display name
    pub name: String,
    /// Origin stop point reference
    pub from: String,
    /// Destination stop point reference
    pub to: String,
}

impl TripConfig {
    /// Create a trip entry
    #[must_use]
    pub fn new(name: impl Into<String>, from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    /// Entity id: lower-cased name with spaces replaced by `-`
    #[must_use]
    pub fn entity_id(&self) -> String {
        self.name.to_lowercase().replace(' ', "-")
    }
}

impl std::fmt::Debug for TriasConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriasConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("timeout_secs", &self.timeout_secs)
            .field("scan_interval_minutes", &self.scan_interval_minutes)
            .field("departure_limit", &self.departure_limit)
            .field("trip_limit", &self.trip_limit)
            .field("min_match_probability", &self.min_match_probability)
            .field("timezone", &self.timezone)
            .field("stops", &self.stops)
            .field("trips", &self.trips)
            .finish()
    }
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_scan_interval_minutes() -> u64 {
    1
}

const fn default_departure_limit() -> u32 {
    2
}

const fn default_trip_limit() -> u32 {
    1
}

const fn default_min_match_probability() -> f64 {
    0.75
}

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

impl Default for TriasConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            api_key: None,
            timeout_secs: default_timeout_secs(),
            scan_interval_minutes: default_scan_interval_minutes(),
            departure_limit: default_departure_limit(),
            trip_limit: default_trip_limit(),
            min_match_probability: default_min_match_probability(),
            timezone: default_timezone(),
            stops: Vec::new(),
            trips: Vec::new(),
        }
    }
}

impl TriasConfig {
    /// Create a configuration for an endpoint and key, everything else default
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: Some(SecretString::from(api_key.into())),
            ..Default::default()
        }
    }

    /// Create a configuration suitable for testing
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            timeout_secs: 5,
            ..Self::new("http://localhost:8080/trias", "test-key")
        }
    }

    /// Get the API key as a string reference
    #[must_use]
    pub fn api_key_str(&self) -> Option<&str> {
        self.api_key.as_ref().map(ExposeSecret::expose_secret)
    }

    /// The API key, which the envelope sends as `RequestorRef`
    ///
    /// # Errors
    ///
    /// Returns [`TriasError::InvalidApiKey`] if no key or a blank key is set.
    pub fn requestor_ref(&self) -> Result<&str, TriasError> {
        self.api_key_str()
            .filter(|key| !key.trim().is_empty())
            .ok_or(TriasError::InvalidApiKey)
    }

    /// The endpoint as a parsed URL
    ///
    /// # Errors
    ///
    /// Returns [`TriasError::InvalidUrl`] unless `base_url` is an absolute
    /// http or https URL.
    pub fn endpoint(&self) -> Result<Url, TriasError> {
        let raw = self.base_url.trim();
        if raw.is_empty() {
            return Err(TriasError::InvalidUrl("base_url must not be empty".to_string()));
        }

        let url = Url::parse(raw).map_err(|e| TriasError::InvalidUrl(format!("{raw}: {e}")))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(TriasError::InvalidUrl(format!(
                "{raw}: unsupported scheme '{other}'"
            ))),
        }
    }

    /// The configured zone for request times
    ///
    /// # Errors
    ///
    /// Returns [`TriasError::Configuration`] for unknown zone names.
    pub fn zone(&self) -> Result<Tz, TriasError> {
        self.timezone.parse::<Tz>().map_err(|_| {
            TriasError::Configuration(format!("unknown timezone '{}'", self.timezone))
        })
    }

    /// Interval between two refresh cycles, at least one minute
    #[must_use]
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_minutes.max(1).saturating_mul(60))
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), TriasError> {
        self.endpoint()?;
        self.requestor_ref()?;
        self.zone()?;

        if self.timeout_secs == 0 {
            return Err(TriasError::Configuration(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.scan_interval_minutes == 0 {
            return Err(TriasError::Configuration(
                "scan_interval_minutes must be greater than 0".to_string(),
            ));
        }

        if self.departure_limit == 0 || self.trip_limit == 0 {
            return Err(TriasError::Configuration(
                "departure_limit and trip_limit must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.min_match_probability) {
            return Err(TriasError::Configuration(format!(
                "min_match_probability must be between 0 and 1, got {}",
                self.min_match_probability
            )));
        }

        if let Some(stop) = self.stops.iter().find(|s| s.trim().is_empty()) {
            return Err(TriasError::Configuration(format!(
                "stop reference '{stop}' must not be empty"
            )));
        }

        for trip in &self.trips {
            if trip.name.trim().is_empty() || trip.from.trim().is_empty() || trip.to.trim().is_empty()
            {
                return Err(TriasError::Configuration(format!(
                    "trip {trip:?} needs a name, an origin and a destination"
                )));
            }
        }

        Ok(())
    }
}

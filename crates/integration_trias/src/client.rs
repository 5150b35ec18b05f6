//! TRIAS client
//!
//! Each operation is one request builder call, one transport round trip and
//! one normalizer call. The client holds no mutable state and can be shared
//! between polling loops.

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::{debug, instrument};

use crate::config::TriasConfig;
use crate::error::TriasError;
use crate::models::{Departure, LocationMatches, Station, Trip, TripInfo};
use crate::normalize;
use crate::request::{
    LocationInformationRequest, StopEventRequest, TriasRequest, TripInfoRequest, TripRequest,
};
use crate::time::RequestTime;
use crate::transport::TriasTransport;

/// Search term used to check that the endpoint answers
const CONNECTION_PROBE: &str = "Hauptbahnhof";

/// Trait for TRIAS clients
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TriasClient: Send + Sync {
    /// Next departures at a stop
    ///
    /// `count` defaults to the configured departure limit, `at` to now.
    async fn get_departures(
        &self,
        stop_id: &str,
        count: Option<u32>,
        at: Option<RequestTime>,
    ) -> Result<Vec<Departure>, TriasError>;

    /// Connections between two stops
    ///
    /// `count` defaults to the configured trip limit, `at` to now.
    async fn get_trip(
        &self,
        origin_id: &str,
        destination_id: &str,
        count: Option<u32>,
        at: Option<RequestTime>,
    ) -> Result<Vec<Trip>, TriasError>;

    /// Course of a single journey
    async fn get_trip_info(
        &self,
        journey_ref: &str,
        operating_day_ref: &str,
    ) -> Result<TripInfo, TriasError>;

    /// Details of the best match for a stop name or reference
    async fn get_station_data(&self, name: &str) -> Result<Station, TriasError>;

    /// Stop point reference of the best match for a stop name
    async fn get_station_id(&self, name: &str) -> Result<String, TriasError>;

    /// Stops matching a search text, display name → stop point reference
    async fn search_locations(
        &self,
        text: &str,
        count: u32,
    ) -> Result<LocationMatches, TriasError>;

    /// Check that the endpoint accepts our key and answers
    async fn test_connection(&self) -> Result<(), TriasError>;
}

/// TRIAS client over HTTP
#[derive(Debug)]
pub struct HttpTriasClient {
    transport: TriasTransport,
    config: TriasConfig,
}

impl HttpTriasClient {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL, API key or timezone is invalid, or
    /// the HTTP client cannot be initialized.
    pub fn new(config: &TriasConfig) -> Result<Self, TriasError> {
        Ok(Self {
            transport: TriasTransport::new(config)?,
            config: config.clone(),
        })
    }

    /// The configuration this client was built with
    #[must_use]
    pub const fn config(&self) -> &TriasConfig {
        &self.config
    }

    async fn find_stations(&self, text: &str, count: u32) -> Result<Vec<Station>, TriasError> {
        let request = LocationInformationRequest::new(text).with_results(count);
        let payload = self.transport.send(&TriasRequest::from(request)).await?;
        let stations = normalize::locations(&payload)?;

        if count == 1 {
            normalize::check_match(text, &stations, self.config.min_match_probability)?;
        }

        Ok(stations)
    }
}

#[async_trait]
impl TriasClient for HttpTriasClient {
    #[instrument(skip(self, at))]
    async fn get_departures(
        &self,
        stop_id: &str,
        count: Option<u32>,
        at: Option<RequestTime>,
    ) -> Result<Vec<Departure>, TriasError> {
        let request = StopEventRequest::new(stop_id)
            .with_results(count.unwrap_or(self.config.departure_limit))
            .at(at);

        let payload = self.transport.send(&request.into()).await?;
        let departures = normalize::departures(&payload)?;

        debug!(count = departures.len(), "Departures found");
        Ok(departures)
    }

    #[instrument(skip(self, at))]
    async fn get_trip(
        &self,
        origin_id: &str,
        destination_id: &str,
        count: Option<u32>,
        at: Option<RequestTime>,
    ) -> Result<Vec<Trip>, TriasError> {
        let request = TripRequest::new(origin_id, destination_id)
            .with_results(count.unwrap_or(self.config.trip_limit))
            .at(at);

        let payload = self.transport.send(&request.into()).await?;
        let trips = normalize::trips(&payload)?;

        debug!(count = trips.len(), "Trips found");
        Ok(trips)
    }

    #[instrument(skip(self))]
    async fn get_trip_info(
        &self,
        journey_ref: &str,
        operating_day_ref: &str,
    ) -> Result<TripInfo, TriasError> {
        let request = TripInfoRequest::new(journey_ref, operating_day_ref);
        let payload = self.transport.send(&request.into()).await?;
        normalize::trip_info(&payload)
    }

    #[instrument(skip(self))]
    async fn get_station_data(&self, name: &str) -> Result<Station, TriasError> {
        self.find_stations(name, 1)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| TriasError::InvalidLocationName {
                requested: name.to_string(),
                found: String::new(),
                probability: 0.0,
            })
    }

    #[instrument(skip(self))]
    async fn get_station_id(&self, name: &str) -> Result<String, TriasError> {
        Ok(self.get_station_data(name).await?.stop_point_ref)
    }

    #[instrument(skip(self))]
    async fn search_locations(
        &self,
        text: &str,
        count: u32,
    ) -> Result<LocationMatches, TriasError> {
        let stations = self.find_stations(text, count).await?;
        debug!(count = stations.len(), "Locations found");
        Ok(normalize::location_matches(&stations))
    }

    #[instrument(skip(self))]
    async fn test_connection(&self) -> Result<(), TriasError> {
        let request = LocationInformationRequest::new(CONNECTION_PROBE);
        self.transport.send(&request.into()).await?;
        debug!("TRIAS endpoint reachable");
        Ok(())
    }
}

//! Polling coordinator
//!
//! Keeps one entity per configured stop and trip, refreshes them on a fixed
//! interval and publishes every refreshed state through a
//! [`tokio::sync::watch`] channel.
//!
//! Each entity tracks whether its last refresh worked (`ok`) and whether the
//! one before did (`previously_ok`). A failure is logged only on the
//! transition from healthy to unhealthy, so a stop that stays unreachable
//! does not flood the log once per cycle.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, instrument, warn};

use crate::client::TriasClient;
use crate::config::{TriasConfig, TripConfig};
use crate::error::TriasError;
use crate::models::{Departure, Trip};

/// A polled stop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopEntity {
    /// Stop point reference
    pub id: String,
    /// Stop name as reported by the service
    pub name: String,
    /// Latitude (WGS84)
    pub latitude: Option<f64>,
    /// Longitude (WGS84)
    pub longitude: Option<f64>,
    /// Last refresh succeeded
    pub ok: bool,
    /// The refresh before the last one succeeded
    pub previously_ok: bool,
    /// Estimated, else timetabled time of the first departure
    pub next_departure: Option<DateTime<FixedOffset>>,
    /// Departures from the last successful refresh
    pub departures: Vec<Departure>,
}

impl StopEntity {
    fn new(id: &str, name: String, latitude: Option<f64>, longitude: Option<f64>) -> Self {
        Self {
            id: id.to_string(),
            name,
            latitude,
            longitude,
            ok: true,
            previously_ok: false,
            next_departure: None,
            departures: Vec::new(),
        }
    }

    /// Entity state: the next departure
    #[must_use]
    pub const fn state(&self) -> Option<DateTime<FixedOffset>> {
        self.next_departure
    }

    /// Extra state attributes
    #[must_use]
    pub fn attributes(&self) -> Value {
        json!({
            "latitude": self.latitude,
            "longitude": self.longitude,
            "departures": self.departures,
        })
    }

    fn apply(&mut self, result: Result<Vec<Departure>, TriasError>) -> bool {
        self.previously_ok = self.ok;
        match result {
            Ok(departures) => {
                self.ok = true;
                self.next_departure = departures.first().map(Departure::expected_time);
                self.departures = departures;
            },
            Err(e) => {
                self.ok = false;
                self.next_departure = None;
                self.departures.clear();
                if self.previously_ok {
                    error!(stop = %self.id, error = %e, "Error when updating stop");
                } else {
                    debug!(stop = %self.id, error = %e, "Stop still failing");
                }
            },
        }
        self.ok
    }
}

/// A polled connection between two stops
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripEntity {
    /// Lower-cased name with spaces replaced by `-`
    pub id: String,
    /// Configured name
    pub name: String,
    /// Origin stop point reference
    pub from: String,
    /// Destination stop point reference
    pub to: String,
    /// Origin stop name
    pub from_name: String,
    /// Destination stop name
    pub to_name: String,
    /// Last refresh succeeded
    pub ok: bool,
    /// The refresh before the last one succeeded
    pub previously_ok: bool,
    /// Start of the next connection
    pub start: Option<DateTime<FixedOffset>>,
    /// The next connection
    pub trip: Option<Trip>,
}

impl TripEntity {
    fn new(config: &TripConfig, from_name: String, to_name: String) -> Self {
        Self {
            id: config.entity_id(),
            name: config.name.clone(),
            from: config.from.clone(),
            to: config.to.clone(),
            from_name,
            to_name,
            ok: true,
            previously_ok: false,
            start: None,
            trip: None,
        }
    }

    /// Entity state: start of the next connection
    #[must_use]
    pub const fn state(&self) -> Option<DateTime<FixedOffset>> {
        self.start
    }

    /// Extra state attributes
    ///
    /// `delay_seconds` is 0 when the delay is unknown.
    #[must_use]
    pub fn attributes(&self) -> Value {
        let mut attributes = json!({
            "from": self.from_name,
            "to": self.to_name,
        });

        if let (Some(trip), Some(map)) = (&self.trip, attributes.as_object_mut()) {
            map.insert("interchanges".to_string(), json!(trip.interchanges));
            map.insert("duration".to_string(), json!(trip.duration.to_string()));
            map.insert(
                "delay".to_string(),
                json!(trip.delay.map(|d| d.to_string())),
            );
            map.insert(
                "delay_seconds".to_string(),
                json!(trip.delay.map_or(0, |d| d.num_seconds())),
            );
        }

        attributes
    }

    fn apply(&mut self, result: Result<Vec<Trip>, TriasError>) -> bool {
        self.previously_ok = self.ok;
        match result {
            Ok(trips) => {
                self.ok = true;
                self.trip = trips.into_iter().next();
                self.start = self.trip.as_ref().map(|t| t.start_time);
            },
            Err(e) => {
                self.ok = false;
                self.trip = None;
                self.start = None;
                if self.previously_ok {
                    warn!(trip = %self.id, error = %e, "Error when updating trip");
                } else {
                    debug!(trip = %self.id, error = %e, "Trip still failing");
                }
            },
        }
        self.ok
    }
}

/// Outcome of one refresh cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RefreshSummary {
    /// Stops refreshed successfully
    pub stops_ok: usize,
    /// Stops that failed
    pub stops_failed: usize,
    /// Trips refreshed successfully
    pub trips_ok: usize,
    /// Trips that failed
    pub trips_failed: usize,
}

impl RefreshSummary {
    /// True if every entity refreshed successfully
    #[must_use]
    pub const fn all_ok(&self) -> bool {
        self.stops_failed == 0 && self.trips_failed == 0
    }
}

/// State published after each refresh
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    /// When the refresh finished
    pub refreshed_at: Option<DateTime<Utc>>,
    /// Stop entities in configuration order
    pub stops: Vec<StopEntity>,
    /// Trip entities in configuration order
    pub trips: Vec<TripEntity>,
}

/// Drives periodic refreshes of all configured entities
pub struct TriasCoordinator {
    client: Arc<dyn TriasClient>,
    config: TriasConfig,
    stops: Vec<StopEntity>,
    trips: Vec<TripEntity>,
    updates: watch::Sender<Arc<Snapshot>>,
}

impl std::fmt::Debug for TriasCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriasCoordinator")
            .field("config", &self.config)
            .field("stops", &self.stops.len())
            .field("trips", &self.trips.len())
            .finish_non_exhaustive()
    }
}

impl TriasCoordinator {
    /// Create a coordinator; call [`Self::setup`] before refreshing
    #[must_use]
    pub fn new(client: Arc<dyn TriasClient>, config: TriasConfig) -> Self {
        let (updates, _) = watch::channel(Arc::new(Snapshot::default()));
        Self {
            client,
            config,
            stops: Vec::new(),
            trips: Vec::new(),
            updates,
        }
    }

    /// Stop entities
    #[must_use]
    pub fn stops(&self) -> &[StopEntity] {
        &self.stops
    }

    /// Trip entities
    #[must_use]
    pub fn trips(&self) -> &[TripEntity] {
        &self.trips
    }

    /// Receive a snapshot after every refresh
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.updates.subscribe()
    }

    /// Resolve configured stops and trips into entities
    ///
    /// Entities whose stops cannot be looked up are logged and skipped.
    #[instrument(skip(self))]
    pub async fn setup(&mut self) {
        self.stops.clear();
        self.trips.clear();

        for stop_id in &self.config.stops {
            match self.client.get_station_data(stop_id).await {
                Ok(station) => {
                    debug!(stop = %stop_id, name = %station.stop_point_name, "Added stop");
                    self.stops.push(StopEntity::new(
                        stop_id,
                        station.stop_point_name,
                        station.latitude,
                        station.longitude,
                    ));
                },
                Err(e) => error!(stop = %stop_id, error = %e, "Could not request stop data"),
            }
        }

        let client = &self.client;
        for trip in &self.config.trips {
            let names = async {
                let from = client.get_station_data(&trip.from).await?;
                let to = client.get_station_data(&trip.to).await?;
                Ok::<_, TriasError>((from.stop_point_name, to.stop_point_name))
            };

            match names.await {
                Ok((from_name, to_name)) => {
                    debug!(trip = %trip.name, from = %from_name, to = %to_name, "Added trip");
                    self.trips.push(TripEntity::new(trip, from_name, to_name));
                },
                Err(e) => error!(trip = %trip.name, error = %e, "Could not request trip data"),
            }
        }

        info!(
            stops = self.stops.len(),
            trips = self.trips.len(),
            "Coordinator set up"
        );
    }

    /// Refresh every entity once
    ///
    /// A failing entity is marked unhealthy; the others are still refreshed.
    #[instrument(skip(self))]
    pub async fn refresh(&mut self) -> RefreshSummary {
        let mut summary = RefreshSummary::default();

        for stop in &mut self.stops {
            let result = self
                .client
                .get_departures(&stop.id, Some(self.config.departure_limit), None)
                .await;
            if stop.apply(result) {
                summary.stops_ok += 1;
            } else {
                summary.stops_failed += 1;
            }
        }

        for trip in &mut self.trips {
            let result = self.client.get_trip(&trip.from, &trip.to, Some(1), None).await;
            if trip.apply(result) {
                summary.trips_ok += 1;
            } else {
                summary.trips_failed += 1;
            }
        }

        self.updates.send_replace(Arc::new(Snapshot {
            refreshed_at: Some(Utc::now()),
            stops: self.stops.clone(),
            trips: self.trips.clone(),
        }));

        debug!(?summary, "Refresh finished");
        summary
    }

    /// Refresh on the configured interval until `shutdown` completes
    ///
    /// The first refresh runs immediately. A refresh still in flight when
    /// `shutdown` completes is abandoned.
    pub async fn run<F>(&mut self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let interval = self.config.scan_interval();
        info!(interval_secs = interval.as_secs(), "Starting TRIAS polling");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {},
            }

            tokio::select! {
                () = &mut shutdown => break,
                summary = self.refresh() => {
                    if !summary.all_ok() {
                        debug!(
                            stops_failed = summary.stops_failed,
                            trips_failed = summary.trips_failed,
                            "Refresh incomplete"
                        );
                    }
                },
            }
        }

        info!("Stopping TRIAS polling");
    }
}

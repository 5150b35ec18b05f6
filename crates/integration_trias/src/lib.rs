//! TRIAS public transit client
//!
//! Talks to TRIAS endpoints (the VDV XML interface run by many German
//! transit associations) and turns their deeply nested answers into flat
//! records: departures at a stop, connections between two stops, the course
//! of a journey and stop search results.
//!
//! # Architecture
//!
//! ```text
//! request ──▶ transport (envelope, HTTP, error scan) ──▶ normalize ──▶ models
//! ```
//!
//! [`TriasClient`] is the façade, implemented by [`HttpTriasClient`].
//! [`TriasCoordinator`] polls configured stops and trips on an interval and
//! tracks their health.
//!
//! # Example
//!
//! ```rust,ignore
//! use integration_trias::{HttpTriasClient, TriasClient, TriasConfig};
//!
//! let config = TriasConfig::new("https://efa-bw.de/trias", "my-requestor-ref");
//! let client = HttpTriasClient::new(&config)?;
//!
//! let stop = client.get_station_id("Stuttgart Hauptbahnhof").await?;
//! for departure in client.get_departures(&stop, Some(5), None).await? {
//!     println!("{departure}");
//! }
//! ```

mod client;
mod config;
mod coordinator;
mod error;
mod models;
pub mod normalize;
pub mod request;
pub mod time;
pub mod transport;
pub mod xml;

pub use client::{HttpTriasClient, TriasClient};
pub use config::{TriasConfig, TripConfig};
pub use coordinator::{RefreshSummary, Snapshot, StopEntity, TriasCoordinator, TripEntity};
pub use error::{ErrorClass, TriasError};
pub use models::{
    ContinuousLeg, Departure, InterchangeLeg, LegKind, LocationMatches, PtMode, Station, TimedLeg,
    Trip, TripCall, TripInfo, TripLeg,
};
pub use request::{
    LocationInformationRequest, StopEventRequest, StopEventType, TriasRequest, TripInfoRequest,
    TripRequest,
};
pub use time::{RequestTime, Span};

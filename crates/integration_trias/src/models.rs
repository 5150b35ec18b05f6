//! TRIAS data models
//!
//! Flat records produced from the nested TRIAS responses.

use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde::{Serialize, Serializer};

use crate::time::Span;

/// Public transport mode as reported in `Mode/PtMode`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PtMode {
    /// Regional and long-distance trains
    Rail,
    /// Intercity trains
    IntercityRail,
    /// S-Bahn
    UrbanRail,
    /// U-Bahn
    Metro,
    /// Tram / Straßenbahn
    Tram,
    /// Bus
    Bus,
    /// Trolley bus
    TrolleyBus,
    /// Long-distance coach
    Coach,
    /// Ferry
    Water,
    /// Cable car
    Cableway,
    /// Funicular
    Funicular,
    /// Plane
    Air,
    /// Taxi
    Taxi,
    /// Anything else, passed through verbatim
    Other(String),
}

impl PtMode {
    /// Map a `PtMode` value to a mode
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "rail" => Self::Rail,
            "intercityRail" => Self::IntercityRail,
            "urbanRail" => Self::UrbanRail,
            "metro" => Self::Metro,
            "tram" => Self::Tram,
            "bus" => Self::Bus,
            "trolleyBus" => Self::TrolleyBus,
            "coach" => Self::Coach,
            "water" => Self::Water,
            "cableway" => Self::Cableway,
            "funicular" => Self::Funicular,
            "air" => Self::Air,
            "taxi" => Self::Taxi,
            other => Self::Other(other.to_string()),
        }
    }

    /// Spelling used on the wire
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Rail => "rail",
            Self::IntercityRail => "intercityRail",
            Self::UrbanRail => "urbanRail",
            Self::Metro => "metro",
            Self::Tram => "tram",
            Self::Bus => "bus",
            Self::TrolleyBus => "trolleyBus",
            Self::Coach => "coach",
            Self::Water => "water",
            Self::Cableway => "cableway",
            Self::Funicular => "funicular",
            Self::Air => "air",
            Self::Taxi => "taxi",
            Self::Other(other) => other,
        }
    }

    /// Rail departures carry a planned bay (platform)
    #[must_use]
    pub const fn is_rail(&self) -> bool {
        matches!(self, Self::Rail)
    }
}

impl fmt::Display for PtMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PtMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One departure at a stop
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Departure {
    /// Position in the service's answer
    pub index: usize,
    /// Transport mode
    pub mode: PtMode,
    /// Name of the stop the departure is at
    pub stop_point_name: String,
    /// Line as shown to passengers (e.g. "U6", "Bus 42")
    pub published_line_name: String,
    /// Destination as shown on the vehicle
    pub destination_text: String,
    /// Scheduled departure
    pub timetabled_time: DateTime<FixedOffset>,
    /// Real-time estimate, if the service has one
    pub estimated_time: Option<DateTime<FixedOffset>>,
    /// `estimated_time - timetabled_time`
    pub current_delay: Option<Span>,
    /// Planned platform (rail only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned_bay: Option<String>,
}

impl Departure {
    /// Best known departure time
    #[must_use]
    pub fn expected_time(&self) -> DateTime<FixedOffset> {
        self.estimated_time.unwrap_or(self.timetabled_time)
    }
}

impl fmt::Display for Departure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} → {}",
            self.expected_time().format("%H:%M"),
            self.published_line_name,
            self.destination_text
        )?;
        if let Some(bay) = &self.planned_bay {
            write!(f, " Gl.{bay}")?;
        }
        match self.current_delay {
            Some(delay) if delay.num_seconds() != 0 => write!(f, " ({delay})"),
            _ => Ok(()),
        }
    }
}

/// A ride on a scheduled service
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedLeg {
    /// Transport mode
    pub mode: PtMode,
    /// Line name, when the service sends one
    pub line_name: Option<String>,
    /// Boarding stop
    pub entry: String,
    /// Scheduled departure at the boarding stop
    pub entry_timetabled_time: DateTime<FixedOffset>,
    /// Estimated departure at the boarding stop
    pub entry_estimated_time: Option<DateTime<FixedOffset>>,
    /// Departure delay
    pub entry_delay: Option<Span>,
    /// Alighting stop
    pub exit: String,
    /// Scheduled arrival at the alighting stop
    pub exit_timetabled_time: DateTime<FixedOffset>,
    /// Estimated arrival at the alighting stop
    pub exit_estimated_time: Option<DateTime<FixedOffset>>,
    /// Arrival delay
    pub exit_delay: Option<Span>,
}

/// Individual travel (walking, cycling, ...) without a timetable
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContinuousLeg {
    /// `IndividualMode`, e.g. "walk"
    pub mode: String,
    /// Earliest start
    pub time_window_start: DateTime<FixedOffset>,
    /// Latest end
    pub time_window_end: DateTime<FixedOffset>,
    /// Travel time
    pub duration: Span,
}

/// Change between two services
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InterchangeLeg {
    /// `InterchangeMode`, e.g. "walk"
    pub mode: String,
    /// Where the interchange starts
    pub entry: String,
    /// Where the interchange ends
    pub exit: String,
    /// Earliest start
    pub time_window_start: DateTime<FixedOffset>,
    /// Latest end
    pub time_window_end: DateTime<FixedOffset>,
    /// Time needed for the change
    pub duration: Span,
    /// Spare time on top of `duration`
    pub buffer_time: Option<Span>,
}

/// What kind of travel a leg is
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LegKind {
    /// Scheduled ride
    Timed(TimedLeg),
    /// Individual travel
    Continuous(ContinuousLeg),
    /// Change
    Interchange(InterchangeLeg),
}

/// One segment of a trip
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripLeg {
    /// `LegId` as sent by the service
    pub leg_id: u32,
    /// Leg details
    #[serde(flatten)]
    pub kind: LegKind,
}

impl TripLeg {
    /// The timed leg, if this is one
    #[must_use]
    pub const fn as_timed(&self) -> Option<&TimedLeg> {
        match &self.kind {
            LegKind::Timed(leg) => Some(leg),
            _ => None,
        }
    }
}

/// A connection from origin to destination
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trip {
    /// Position in the service's answer
    pub route_nr: usize,
    /// Number of changes
    pub interchanges: u32,
    /// Total travel time
    pub duration: Span,
    /// Start of the trip
    pub start_time: DateTime<FixedOffset>,
    /// End of the trip
    pub end_time: DateTime<FixedOffset>,
    /// Legs in travel order
    pub legs: Vec<TripLeg>,
    /// Scheduled departure of the first leg (timed legs only)
    pub start_timetabled_time: Option<DateTime<FixedOffset>>,
    /// Estimated departure of the first leg
    pub start_estimated_time: Option<DateTime<FixedOffset>>,
    /// Start delay
    pub delay: Option<Span>,
}

impl fmt::Display for Trip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} → {} ({}, {} change{})",
            self.start_time.format("%H:%M"),
            self.end_time.format("%H:%M"),
            self.duration,
            self.interchanges,
            if self.interchanges == 1 { "" } else { "s" }
        )?;
        match self.delay {
            Some(delay) if delay.num_seconds() != 0 => write!(f, " delay {delay}"),
            _ => Ok(()),
        }
    }
}

/// A stop on a journey
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripCall {
    /// Stop point reference
    pub stop_point_ref: String,
    /// Stop name
    pub stop_point_name: String,
    /// Scheduled arrival
    pub timetabled_arrival: Option<DateTime<FixedOffset>>,
    /// Estimated arrival
    pub estimated_arrival: Option<DateTime<FixedOffset>>,
    /// Scheduled departure
    pub timetabled_departure: Option<DateTime<FixedOffset>>,
    /// Estimated departure
    pub estimated_departure: Option<DateTime<FixedOffset>>,
}

/// Course of a single journey
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripInfo {
    /// Line name
    pub line_name: Option<String>,
    /// Transport mode
    pub mode: Option<PtMode>,
    /// Where the journey starts
    pub origin_name: Option<String>,
    /// Where the journey ends
    pub destination_name: Option<String>,
    /// Calls in travel order, past ones first
    pub calls: Vec<TripCall>,
}

/// A stop found by a location search
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    /// Stop point reference
    pub stop_point_ref: String,
    /// Stop name
    pub stop_point_name: String,
    /// Locality (town, district)
    pub location_name: Option<String>,
    /// Latitude (WGS84)
    pub latitude: Option<f64>,
    /// Longitude (WGS84)
    pub longitude: Option<f64>,
    /// How sure the service is that this is what was searched for
    pub probability: Option<f64>,
}

impl Station {
    /// Name shown when picking a stop: "<locality>, <stop>"
    #[must_use]
    pub fn display_name(&self) -> String {
        match &self.location_name {
            Some(locality) => format!("{locality}, {}", self.stop_point_name),
            None => self.stop_point_name.clone(),
        }
    }
}

impl fmt::Display for Station {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

/// Search results, display name → stop point reference, best match first
///
/// Keeps the order of the service's answer. Serializes as a JSON object
/// with keys in that order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationMatches {
    entries: Vec<(String, String)>,
}

impl LocationMatches {
    /// Add a match; a repeated name keeps its position and takes the new reference
    pub fn insert(&mut self, name: String, stop_point_ref: String) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == name) {
            Some(entry) => entry.1 = stop_point_ref,
            None => self.entries.push((name, stop_point_ref)),
        }
    }

    /// Stop point reference for a display name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, stop_point_ref)| stop_point_ref.as_str())
    }

    /// Display names, best match first
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// (display name, stop point reference) pairs, best match first
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, stop_point_ref)| (name.as_str(), stop_point_ref.as_str()))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for LocationMatches {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

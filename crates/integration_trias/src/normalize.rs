//! Response normalizers
//!
//! Turn a `DeliveryPayload` tree into the flat records in [`crate::models`].
//! Required elements that are missing fail with [`TriasError::ParseError`];
//! optional ones (estimated times, buffer time, bay) become `None`.

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::error::TriasError;
use crate::models::{
    ContinuousLeg, Departure, InterchangeLeg, LegKind, LocationMatches, PtMode, Station, TimedLeg,
    Trip, TripCall, TripInfo, TripLeg,
};
use crate::time::{delay_between, parse_duration, parse_instant};
use crate::xml::XmlValue;

fn required_instant(node: &XmlValue, path: &[&str]) -> Result<DateTime<FixedOffset>, TriasError> {
    parse_instant(Some(node.require_text(path)?))?
        .ok_or_else(|| TriasError::missing(&path.join("/")))
}

fn optional_instant(
    node: &XmlValue,
    path: &[&str],
) -> Result<Option<DateTime<FixedOffset>>, TriasError> {
    parse_instant(node.text_at(path))
}

fn parse_number<T: std::str::FromStr>(node: &XmlValue, path: &[&str]) -> Result<T, TriasError> {
    let text = node.require_text(path)?;
    text.parse()
        .map_err(|_| TriasError::ParseError(format!("`{}` is not a number: '{text}'", path.join("/"))))
}

fn optional_float(node: &XmlValue, path: &[&str]) -> Result<Option<f64>, TriasError> {
    node.text_at(path)
        .map(|text| {
            text.parse::<f64>().map_err(|_| {
                TriasError::ParseError(format!("`{}` is not a number: '{text}'", path.join("/")))
            })
        })
        .transpose()
}

/// Departures from a `StopEventResponse`
///
/// A response without `StopEventResult` means there is nothing departing.
pub fn departures(payload: &XmlValue) -> Result<Vec<Departure>, TriasError> {
    let response = payload.require(&["StopEventResponse"])?;
    let Some(results) = response.get("StopEventResult") else {
        debug!("Stop event response without results");
        return Ok(Vec::new());
    };

    results
        .as_list()
        .iter()
        .enumerate()
        .map(|(index, result)| departure(index, result))
        .collect()
}

fn departure(index: usize, result: &XmlValue) -> Result<Departure, TriasError> {
    let event = result.require(&["StopEvent"])?;
    let service = event.require(&["Service"])?;
    let call = event.require(&["ThisCall", "CallAtStop"])?;

    let mode = PtMode::parse(service.require_text(&["Mode", "PtMode"])?);

    // Arrival boards carry ServiceArrival instead of ServiceDeparture
    let times = call
        .get("ServiceDeparture")
        .or_else(|| call.get("ServiceArrival"))
        .ok_or_else(|| TriasError::missing("CallAtStop/ServiceDeparture"))?;

    let timetabled_time = required_instant(times, &["TimetabledTime"])?;
    let estimated_time = optional_instant(times, &["EstimatedTime"])?;

    let planned_bay = if mode.is_rail() {
        call.text_at(&["PlannedBay", "Text"]).map(str::to_owned)
    } else {
        None
    };

    Ok(Departure {
        index,
        mode,
        stop_point_name: call.require_text(&["StopPointName", "Text"])?.to_owned(),
        published_line_name: service.require_text(&["PublishedLineName", "Text"])?.to_owned(),
        destination_text: service.require_text(&["DestinationText", "Text"])?.to_owned(),
        timetabled_time,
        estimated_time,
        current_delay: delay_between(estimated_time, Some(timetabled_time)),
        planned_bay,
    })
}

/// Trips from a `TripResponse`
pub fn trips(payload: &XmlValue) -> Result<Vec<Trip>, TriasError> {
    let response = payload.require(&["TripResponse"])?;
    let Some(results) = response.get("TripResult") else {
        debug!("Trip response without results");
        return Ok(Vec::new());
    };

    results
        .as_list()
        .iter()
        .enumerate()
        .map(|(route_nr, result)| trip(route_nr, result))
        .collect()
}

fn trip(route_nr: usize, result: &XmlValue) -> Result<Trip, TriasError> {
    let node = result.require(&["Trip"])?;

    // Single-leg trips send TripLeg as one element; as_list covers both shapes
    let legs = node
        .require(&["TripLeg"])?
        .as_list()
        .iter()
        .map(trip_leg)
        .collect::<Result<Vec<_>, _>>()?;

    let first_timed = legs.first().and_then(TripLeg::as_timed);
    let start_timetabled_time = first_timed.map(|leg| leg.entry_timetabled_time);
    let start_estimated_time = first_timed.and_then(|leg| leg.entry_estimated_time);

    Ok(Trip {
        route_nr,
        interchanges: parse_number(node, &["Interchanges"])?,
        duration: parse_duration(node.require_text(&["Duration"])?),
        start_time: required_instant(node, &["StartTime"])?,
        end_time: required_instant(node, &["EndTime"])?,
        legs,
        start_timetabled_time,
        start_estimated_time,
        delay: delay_between(start_estimated_time, start_timetabled_time),
    })
}

fn trip_leg(node: &XmlValue) -> Result<TripLeg, TriasError> {
    let leg_id = parse_number(node, &["LegId"])?;

    let kind = if let Some(leg) = node.get("TimedLeg") {
        LegKind::Timed(timed_leg(leg)?)
    } else if let Some(leg) = node.get("ContinuousLeg") {
        LegKind::Continuous(ContinuousLeg {
            mode: leg.require_text(&["Service", "IndividualMode"])?.to_owned(),
            time_window_start: required_instant(leg, &["TimeWindowStart"])?,
            time_window_end: required_instant(leg, &["TimeWindowEnd"])?,
            duration: parse_duration(leg.require_text(&["Duration"])?),
        })
    } else if let Some(leg) = node.get("InterchangeLeg") {
        LegKind::Interchange(InterchangeLeg {
            mode: leg.require_text(&["InterchangeMode"])?.to_owned(),
            entry: leg.require_text(&["LegStart", "LocationName", "Text"])?.to_owned(),
            exit: leg.require_text(&["LegEnd", "LocationName", "Text"])?.to_owned(),
            time_window_start: required_instant(leg, &["TimeWindowStart"])?,
            time_window_end: required_instant(leg, &["TimeWindowEnd"])?,
            duration: parse_duration(leg.require_text(&["Duration"])?),
            buffer_time: leg.text_at(&["BufferTime"]).map(parse_duration),
        })
    } else {
        return Err(TriasError::ParseError(format!(
            "trip leg {leg_id} is neither TimedLeg, ContinuousLeg nor InterchangeLeg"
        )));
    };

    Ok(TripLeg { leg_id, kind })
}

fn timed_leg(leg: &XmlValue) -> Result<TimedLeg, TriasError> {
    let board = leg.require(&["LegBoard"])?;
    let alight = leg.require(&["LegAlight"])?;

    let entry_timetabled_time = required_instant(board, &["ServiceDeparture", "TimetabledTime"])?;
    let entry_estimated_time = optional_instant(board, &["ServiceDeparture", "EstimatedTime"])?;
    let exit_timetabled_time = required_instant(alight, &["ServiceArrival", "TimetabledTime"])?;
    let exit_estimated_time = optional_instant(alight, &["ServiceArrival", "EstimatedTime"])?;

    Ok(TimedLeg {
        mode: PtMode::parse(leg.require_text(&["Service", "Mode", "PtMode"])?),
        line_name: leg
            .text_at(&["Service", "PublishedLineName", "Text"])
            .map(str::to_owned),
        entry: board.require_text(&["StopPointName", "Text"])?.to_owned(),
        entry_timetabled_time,
        entry_estimated_time,
        entry_delay: delay_between(entry_estimated_time, Some(entry_timetabled_time)),
        exit: alight.require_text(&["StopPointName", "Text"])?.to_owned(),
        exit_timetabled_time,
        exit_estimated_time,
        exit_delay: delay_between(exit_estimated_time, Some(exit_timetabled_time)),
    })
}

/// Journey details from a `TripInfoResponse`
pub fn trip_info(payload: &XmlValue) -> Result<TripInfo, TriasError> {
    let result = payload.require(&["TripInfoResponse", "TripInfoResult"])?;

    let mut calls = Vec::new();
    for key in ["PreviousCall", "OnwardCall"] {
        if let Some(entries) = result.get(key) {
            for entry in entries.as_list() {
                calls.push(trip_call(entry)?);
            }
        }
    }

    let service = result.get("Service");
    let service_text =
        |path: &[&str]| service.and_then(|s| s.text_at(path)).map(str::to_owned);

    Ok(TripInfo {
        line_name: service_text(&["PublishedLineName", "Text"]),
        mode: service_text(&["Mode", "PtMode"]).map(|m| PtMode::parse(&m)),
        origin_name: service_text(&["OriginText", "Text"]),
        destination_name: service_text(&["DestinationText", "Text"]),
        calls,
    })
}

fn trip_call(node: &XmlValue) -> Result<TripCall, TriasError> {
    Ok(TripCall {
        stop_point_ref: node.require_text(&["StopPointRef"])?.to_owned(),
        stop_point_name: node.require_text(&["StopPointName", "Text"])?.to_owned(),
        timetabled_arrival: optional_instant(node, &["ServiceArrival", "TimetabledTime"])?,
        estimated_arrival: optional_instant(node, &["ServiceArrival", "EstimatedTime"])?,
        timetabled_departure: optional_instant(node, &["ServiceDeparture", "TimetabledTime"])?,
        estimated_departure: optional_instant(node, &["ServiceDeparture", "EstimatedTime"])?,
    })
}

/// Stops from a `LocationInformationResponse`, best match first
pub fn locations(payload: &XmlValue) -> Result<Vec<Station>, TriasError> {
    let response = payload.require(&["LocationInformationResponse"])?;
    let Some(results) = response.get("Location") else {
        return Ok(Vec::new());
    };

    results.as_list().iter().map(station).collect()
}

fn station(result: &XmlValue) -> Result<Station, TriasError> {
    let location = result.require(&["Location"])?;

    Ok(Station {
        stop_point_ref: location.require_text(&["StopPoint", "StopPointRef"])?.to_owned(),
        stop_point_name: location
            .require_text(&["StopPoint", "StopPointName", "Text"])?
            .to_owned(),
        location_name: location.text_at(&["LocationName", "Text"]).map(str::to_owned),
        latitude: optional_float(location, &["GeoPosition", "Latitude"])?,
        longitude: optional_float(location, &["GeoPosition", "Longitude"])?,
        probability: optional_float(result, &["Probability"])?,
    })
}

/// Reject a single-result search whose best match is too uncertain
///
/// Matches without a probability are accepted.
pub fn check_match(
    requested: &str,
    stations: &[Station],
    min_probability: f64,
) -> Result<(), TriasError> {
    let Some(best) = stations.first() else {
        return Ok(());
    };

    match best.probability {
        Some(probability) if probability < min_probability => {
            Err(TriasError::InvalidLocationName {
                requested: requested.to_string(),
                found: best.stop_point_name.clone(),
                probability,
            })
        },
        _ => Ok(()),
    }
}

/// Display name → stop point reference
#[must_use]
pub fn location_matches(stations: &[Station]) -> LocationMatches {
    let mut matches = LocationMatches::default();
    for station in stations {
        matches.insert(station.display_name(), station.stop_point_ref.clone());
    }
    matches
}

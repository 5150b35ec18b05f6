//! TRIAS request payloads
//!
//! One struct per request kind. Each writes itself into an [`XmlBuilder`];
//! the transport wraps the result in the envelope.

use chrono_tz::Tz;

use crate::error::TriasError;
use crate::time::{RequestTime, to_local_string};
use crate::xml::XmlBuilder;

/// Whether a stop-event request asks for departures or arrivals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopEventType {
    /// Departures from the stop
    #[default]
    Departure,
    /// Arrivals at the stop
    Arrival,
}

impl StopEventType {
    /// Spelling used on the wire
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Departure => "departure",
            Self::Arrival => "arrival",
        }
    }
}

/// Departures (or arrivals) at one stop
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopEventRequest {
    /// Stop point reference
    pub location_ref: String,
    /// Reference time; the service uses "now" when absent
    pub dep_arr_time: Option<RequestTime>,
    /// Maximum number of stop events
    pub number_of_results: u32,
    /// Departures or arrivals
    pub stop_event_type: StopEventType,
    /// Include calls before this stop
    pub include_previous_calls: bool,
    /// Include calls after this stop
    pub include_onward_calls: bool,
    /// Include real-time estimates
    pub include_realtime_data: bool,
}

impl StopEventRequest {
    /// Next departure at `location_ref`, with real-time data
    #[must_use]
    pub fn new(location_ref: impl Into<String>) -> Self {
        Self {
            location_ref: location_ref.into(),
            dep_arr_time: None,
            number_of_results: 1,
            stop_event_type: StopEventType::Departure,
            include_previous_calls: false,
            include_onward_calls: false,
            include_realtime_data: true,
        }
    }

    /// Set the number of results
    #[must_use]
    pub const fn with_results(mut self, number_of_results: u32) -> Self {
        self.number_of_results = number_of_results;
        self
    }

    /// Set the reference time
    #[must_use]
    pub fn at(mut self, time: Option<RequestTime>) -> Self {
        self.dep_arr_time = time;
        self
    }

    /// Ask for arrivals instead of departures
    #[must_use]
    pub const fn arrivals(mut self) -> Self {
        self.stop_event_type = StopEventType::Arrival;
        self
    }
}

/// Connections between two stops
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripRequest {
    /// Origin stop point reference
    pub origin_ref: String,
    /// Destination stop point reference
    pub destination_ref: String,
    /// Departure time at the origin
    pub dep_arr_time: Option<RequestTime>,
    /// Maximum number of trips
    pub number_of_results: u32,
}

impl TripRequest {
    /// Next trip from `origin_ref` to `destination_ref`
    #[must_use]
    pub fn new(origin_ref: impl Into<String>, destination_ref: impl Into<String>) -> Self {
        Self {
            origin_ref: origin_ref.into(),
            destination_ref: destination_ref.into(),
            dep_arr_time: None,
            number_of_results: 1,
        }
    }

    /// Set the number of results
    #[must_use]
    pub const fn with_results(mut self, number_of_results: u32) -> Self {
        self.number_of_results = number_of_results;
        self
    }

    /// Set the departure time
    #[must_use]
    pub fn at(mut self, time: Option<RequestTime>) -> Self {
        self.dep_arr_time = time;
        self
    }
}

/// Details of one journey on one operating day
#[allow(clippy::struct_excessive_bools)]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripInfoRequest {
    /// Journey reference as returned in stop events and trips
    pub journey_ref: String,
    /// Operating day reference (usually the date)
    pub operating_day_ref: String,
    /// Skip real-time data
    pub use_timetabled_data_only: bool,
    /// Include the calls of the journey
    pub include_calls: bool,
    /// Include the vehicle position
    pub include_position: bool,
    /// Include service (line) information
    pub include_service: bool,
}

impl TripInfoRequest {
    /// Calls and service for a journey, timetabled data only
    #[must_use]
    pub fn new(journey_ref: impl Into<String>, operating_day_ref: impl Into<String>) -> Self {
        Self {
            journey_ref: journey_ref.into(),
            operating_day_ref: operating_day_ref.into(),
            use_timetabled_data_only: true,
            include_calls: true,
            include_position: false,
            include_service: true,
        }
    }
}

/// Stop search by free text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationInformationRequest {
    /// Text to search for
    pub location_name: String,
    /// Maximum number of matches
    pub number_of_results: u32,
    /// Include the public transport modes serving each stop
    pub include_pt_modes: bool,
}

impl LocationInformationRequest {
    /// Best match for `location_name`
    #[must_use]
    pub fn new(location_name: impl Into<String>) -> Self {
        Self {
            location_name: location_name.into(),
            number_of_results: 1,
            include_pt_modes: false,
        }
    }

    /// Set the number of results
    #[must_use]
    pub const fn with_results(mut self, number_of_results: u32) -> Self {
        self.number_of_results = number_of_results;
        self
    }
}

/// Any request the client can send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TriasRequest {
    /// `StopEventRequest`
    StopEvent(StopEventRequest),
    /// `TripRequest`
    Trip(TripRequest),
    /// `TripInfoRequest`
    TripInfo(TripInfoRequest),
    /// `LocationInformationRequest`
    LocationInformation(LocationInformationRequest),
}

impl From<StopEventRequest> for TriasRequest {
    fn from(value: StopEventRequest) -> Self {
        Self::StopEvent(value)
    }
}

impl From<TripRequest> for TriasRequest {
    fn from(value: TripRequest) -> Self {
        Self::Trip(value)
    }
}

impl From<TripInfoRequest> for TriasRequest {
    fn from(value: TripInfoRequest) -> Self {
        Self::TripInfo(value)
    }
}

impl From<LocationInformationRequest> for TriasRequest {
    fn from(value: LocationInformationRequest) -> Self {
        Self::LocationInformation(value)
    }
}

impl TriasRequest {
    /// Name of the payload element
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::StopEvent(_) => "StopEventRequest",
            Self::Trip(_) => "TripRequest",
            Self::TripInfo(_) => "TripInfoRequest",
            Self::LocationInformation(_) => "LocationInformationRequest",
        }
    }

    /// Reject arguments the service would refuse or misread
    pub fn validate(&self) -> Result<(), TriasError> {
        match self {
            Self::StopEvent(req) => {
                require_ref("location reference", &req.location_ref)?;
                require_count(req.number_of_results)
            },
            Self::Trip(req) => {
                require_ref("origin reference", &req.origin_ref)?;
                require_ref("destination reference", &req.destination_ref)?;
                require_count(req.number_of_results)
            },
            Self::TripInfo(req) => {
                require_ref("journey reference", &req.journey_ref)?;
                require_ref("operating day reference", &req.operating_day_ref)
            },
            Self::LocationInformation(req) => {
                require_ref("location name", &req.location_name)?;
                require_count(req.number_of_results)
            },
        }
    }

    /// Render only the payload element, without envelope
    pub fn render_payload(&self, zone: Tz) -> Result<String, TriasError> {
        let mut xml = XmlBuilder::new();
        self.write_into(&mut xml, zone)?;
        xml.finish()
    }

    /// Write the payload element into `xml`
    pub fn write_into(&self, xml: &mut XmlBuilder, zone: Tz) -> Result<(), TriasError> {
        self.validate()?;
        match self {
            Self::StopEvent(req) => write_stop_event(xml, req, zone),
            Self::Trip(req) => write_trip(xml, req, zone),
            Self::TripInfo(req) => write_trip_info(xml, req),
            Self::LocationInformation(req) => write_location_information(xml, req),
        }
    }
}

fn require_ref(what: &str, value: &str) -> Result<(), TriasError> {
    if value.trim().is_empty() {
        return Err(TriasError::InvalidParameter(format!("{what} must not be empty")));
    }
    Ok(())
}

fn require_count(count: u32) -> Result<(), TriasError> {
    if count < 1 {
        return Err(TriasError::InvalidParameter(format!(
            "number of results must be 1 or greater, got {count}"
        )));
    }
    Ok(())
}

fn write_location_ref(xml: &mut XmlBuilder, stop_point_ref: &str) -> Result<(), TriasError> {
    xml.open("LocationRef")?
        .leaf("StopPointRef", stop_point_ref)?
        .close("LocationRef")?;
    Ok(())
}

fn write_dep_arr_time(
    xml: &mut XmlBuilder,
    time: Option<RequestTime>,
    zone: Tz,
) -> Result<(), TriasError> {
    if let Some(time) = time {
        xml.leaf("DepArrTime", &to_local_string(time, zone))?;
    }
    Ok(())
}

fn write_stop_event(
    xml: &mut XmlBuilder,
    req: &StopEventRequest,
    zone: Tz,
) -> Result<(), TriasError> {
    xml.open("StopEventRequest")?.open("Location")?;
    write_location_ref(xml, &req.location_ref)?;
    write_dep_arr_time(xml, req.dep_arr_time, zone)?;
    xml.close("Location")?
        .open("Params")?
        .leaf("NumberOfResults", &req.number_of_results.to_string())?
        .leaf("StopEventType", req.stop_event_type.as_str())?
        .flag("IncludePreviousCalls", req.include_previous_calls)?
        .flag("IncludeOnwardCalls", req.include_onward_calls)?
        .flag("IncludeRealtimeData", req.include_realtime_data)?
        .close("Params")?
        .close("StopEventRequest")?;
    Ok(())
}

fn write_trip(xml: &mut XmlBuilder, req: &TripRequest, zone: Tz) -> Result<(), TriasError> {
    xml.open("TripRequest")?.open("Origin")?;
    write_location_ref(xml, &req.origin_ref)?;
    write_dep_arr_time(xml, req.dep_arr_time, zone)?;
    xml.close("Origin")?.open("Destination")?;
    write_location_ref(xml, &req.destination_ref)?;
    xml.close("Destination")?
        .open("Params")?
        .leaf("NumberOfResults", &req.number_of_results.to_string())?
        .flag("IncludeTrackSections", false)?
        .flag("IncludeLegProjection", true)?
        .flag("IncludeIntermediateStops", false)?
        .close("Params")?
        .close("TripRequest")?;
    Ok(())
}

fn write_trip_info(xml: &mut XmlBuilder, req: &TripInfoRequest) -> Result<(), TriasError> {
    xml.open("TripInfoRequest")?
        .leaf("JourneyRef", &req.journey_ref)?
        .leaf("OperatingDayRef", &req.operating_day_ref)?
        .open("Params")?
        .flag("UseTimetabledDataOnly", req.use_timetabled_data_only)?
        .flag("IncludeCalls", req.include_calls)?
        .flag("IncludePosition", req.include_position)?
        .flag("IncludeService", req.include_service)?
        .close("Params")?
        .close("TripInfoRequest")?;
    Ok(())
}

fn write_location_information(
    xml: &mut XmlBuilder,
    req: &LocationInformationRequest,
) -> Result<(), TriasError> {
    xml.open("LocationInformationRequest")?
        .open("InitialInput")?
        .leaf("LocationName", &req.location_name)?
        .close("InitialInput")?
        .open("Restrictions")?
        .leaf("Type", "stop")?
        .leaf("NumberOfResults", &req.number_of_results.to_string())?
        .flag("IncludePtModes", req.include_pt_modes)?
        .close("Restrictions")?
        .close("LocationInformationRequest")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::time::REFERENCE_ZONE;
    use crate::xml::parse;

    fn render(request: impl Into<TriasRequest>) -> String {
        request.into().render_payload(REFERENCE_ZONE).unwrap()
    }

    #[test]
    fn test_stop_event_defaults() {
        let xml = render(StopEventRequest::new("de:08111:6115").with_results(3));
        let doc = parse(&xml).unwrap();

        assert_eq!(
            doc.text_at(&["StopEventRequest", "Location", "LocationRef", "StopPointRef"]),
            Some("de:08111:6115")
        );
        assert_eq!(
            doc.text_at(&["StopEventRequest", "Params", "NumberOfResults"]),
            Some("3")
        );
        assert_eq!(
            doc.text_at(&["StopEventRequest", "Params", "StopEventType"]),
            Some("departure")
        );
        assert_eq!(
            doc.text_at(&["StopEventRequest", "Params", "IncludeRealtimeData"]),
            Some("true")
        );
        assert_eq!(
            doc.text_at(&["StopEventRequest", "Params", "IncludeOnwardCalls"]),
            Some("false")
        );
        assert!(!xml.contains("DepArrTime"));
    }

    #[test]
    fn test_stop_event_with_time_and_arrivals() {
        let at = Utc.with_ymd_and_hms(2023, 12, 1, 6, 0, 0).unwrap();
        let xml = render(
            StopEventRequest::new("de:08111:6115")
                .at(Some(at.into()))
                .arrivals(),
        );
        let doc = parse(&xml).unwrap();

        assert_eq!(
            doc.text_at(&["StopEventRequest", "Location", "DepArrTime"]),
            Some("2023-12-01T07:00:00")
        );
        assert_eq!(
            doc.text_at(&["StopEventRequest", "Params", "StopEventType"]),
            Some("arrival")
        );
    }

    #[test]
    fn test_trip_request_fixed_flags() {
        let xml = render(TripRequest::new("de:A", "de:B").with_results(2));
        let doc = parse(&xml).unwrap();

        assert_eq!(
            doc.text_at(&["TripRequest", "Origin", "LocationRef", "StopPointRef"]),
            Some("de:A")
        );
        assert_eq!(
            doc.text_at(&["TripRequest", "Destination", "LocationRef", "StopPointRef"]),
            Some("de:B")
        );
        assert_eq!(
            doc.text_at(&["TripRequest", "Params", "IncludeTrackSections"]),
            Some("false")
        );
        assert_eq!(
            doc.text_at(&["TripRequest", "Params", "IncludeLegProjection"]),
            Some("true")
        );
        assert_eq!(
            doc.text_at(&["TripRequest", "Params", "IncludeIntermediateStops"]),
            Some("false")
        );
        assert_eq!(
            doc.text_at(&["TripRequest", "Params", "NumberOfResults"]),
            Some("2")
        );
    }

    #[test]
    fn test_trip_info_request() {
        let xml = render(TripInfoRequest::new("ddb:90E43:A:H:j24:1", "2024-03-01"));
        let doc = parse(&xml).unwrap();

        assert_eq!(
            doc.text_at(&["TripInfoRequest", "JourneyRef"]),
            Some("ddb:90E43:A:H:j24:1")
        );
        assert_eq!(
            doc.text_at(&["TripInfoRequest", "Params", "UseTimetabledDataOnly"]),
            Some("true")
        );
        assert_eq!(
            doc.text_at(&["TripInfoRequest", "Params", "IncludePosition"]),
            Some("false")
        );
    }

    #[test]
    fn test_location_information_escapes_name() {
        let xml = render(LocationInformationRequest::new("Bahnhof</LocationName><Evil>").with_results(4));
        assert!(!xml.contains("<Evil>"));

        let doc = parse(&xml).unwrap();
        assert_eq!(
            doc.text_at(&["LocationInformationRequest", "InitialInput", "LocationName"]),
            Some("Bahnhof</LocationName><Evil>")
        );
        assert_eq!(
            doc.text_at(&["LocationInformationRequest", "Restrictions", "Type"]),
            Some("stop")
        );
        assert_eq!(
            doc.text_at(&["LocationInformationRequest", "Restrictions", "NumberOfResults"]),
            Some("4")
        );
    }

    #[test]
    fn test_zero_results_rejected() {
        let requests: Vec<TriasRequest> = vec![
            StopEventRequest::new("a").with_results(0).into(),
            TripRequest::new("a", "b").with_results(0).into(),
            LocationInformationRequest::new("a").with_results(0).into(),
        ];
        for request in requests {
            assert!(matches!(
                request.render_payload(REFERENCE_ZONE),
                Err(TriasError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_empty_references_rejected() {
        assert!(matches!(
            TriasRequest::from(StopEventRequest::new("  ")).validate(),
            Err(TriasError::InvalidParameter(_))
        ));
        assert!(matches!(
            TriasRequest::from(TripRequest::new("a", "")).validate(),
            Err(TriasError::InvalidParameter(_))
        ));
        assert!(matches!(
            TriasRequest::from(TripInfoRequest::new("", "2024-03-01")).validate(),
            Err(TriasError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_kind_names() {
        assert_eq!(
            TriasRequest::from(StopEventRequest::new("a")).kind(),
            "StopEventRequest"
        );
        assert_eq!(
            TriasRequest::from(LocationInformationRequest::new("a")).kind(),
            "LocationInformationRequest"
        );
    }
}

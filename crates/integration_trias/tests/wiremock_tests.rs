//! Integration tests for the TRIAS client (wiremock-based)

use std::time::Duration;

use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use integration_trias::{
    ErrorClass, HttpTriasClient, LegKind, PtMode, TriasClient, TriasConfig, TriasError,
};

fn config_for_mock(base_url: &str) -> TriasConfig {
    TriasConfig {
        timeout_secs: 5,
        ..TriasConfig::new(format!("{base_url}/trias"), "test-requestor")
    }
}

fn delivery(inner: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<trias:Trias xmlns:siri="http://www.siri.org.uk/siri" xmlns:trias="http://www.vdv.de/trias" version="1.1">
  <trias:ServiceDelivery>
    <siri:ResponseTimestamp>2024-03-01T07:00:00Z</siri:ResponseTimestamp>
    <siri:ProducerRef>EFAController10.6.21.29-EFA2</siri:ProducerRef>
    <siri:Status>true</siri:Status>
    <trias:Language>de</trias:Language>
    <trias:DeliveryPayload>{inner}</trias:DeliveryPayload>
  </trias:ServiceDelivery>
</trias:Trias>"#
    )
}

const STOP_EVENT_RESPONSE: &str = r"
<trias:StopEventResponse>
  <trias:StopEventResult>
    <trias:ResultId>ID-1</trias:ResultId>
    <trias:StopEvent>
      <trias:ThisCall>
        <trias:CallAtStop>
          <trias:StopPointRef>de:08111:6115:2:3</trias:StopPointRef>
          <trias:StopPointName><trias:Text>Hauptbahnhof (tief)</trias:Text><trias:Language>de</trias:Language></trias:StopPointName>
          <trias:PlannedBay><trias:Text>3</trias:Text></trias:PlannedBay>
          <trias:ServiceDeparture>
            <trias:TimetabledTime>2024-03-01T07:05:00Z</trias:TimetabledTime>
            <trias:EstimatedTime>2024-03-01T07:07:00Z</trias:EstimatedTime>
          </trias:ServiceDeparture>
        </trias:CallAtStop>
      </trias:ThisCall>
      <trias:Service>
        <trias:Mode><trias:PtMode>rail</trias:PtMode></trias:Mode>
        <trias:PublishedLineName><trias:Text>S1</trias:Text></trias:PublishedLineName>
        <trias:DestinationText><trias:Text>Herrenberg</trias:Text></trias:DestinationText>
      </trias:Service>
    </trias:StopEvent>
  </trias:StopEventResult>
</trias:StopEventResponse>";

const TRIP_RESPONSE: &str = r"
<trias:TripResponse>
  <trias:TripResult>
    <trias:ResultId>ID-1</trias:ResultId>
    <trias:Trip>
      <trias:TripId>ID-1</trias:TripId>
      <trias:Duration>PT24M</trias:Duration>
      <trias:StartTime>2024-03-01T07:10:00Z</trias:StartTime>
      <trias:EndTime>2024-03-01T07:34:00Z</trias:EndTime>
      <trias:Interchanges>0</trias:Interchanges>
      <trias:TripLeg>
        <trias:LegId>1</trias:LegId>
        <trias:TimedLeg>
          <trias:LegBoard>
            <trias:StopPointRef>de:08111:6115</trias:StopPointRef>
            <trias:StopPointName><trias:Text>Hauptbahnhof</trias:Text></trias:StopPointName>
            <trias:ServiceDeparture>
              <trias:TimetabledTime>2024-03-01T07:10:00Z</trias:TimetabledTime>
              <trias:EstimatedTime>2024-03-01T07:11:00Z</trias:EstimatedTime>
            </trias:ServiceDeparture>
          </trias:LegBoard>
          <trias:LegAlight>
            <trias:StopPointRef>de:08111:2201</trias:StopPointRef>
            <trias:StopPointName><trias:Text>Universität</trias:Text></trias:StopPointName>
            <trias:ServiceArrival>
              <trias:TimetabledTime>2024-03-01T07:34:00Z</trias:TimetabledTime>
            </trias:ServiceArrival>
          </trias:LegAlight>
          <trias:Service>
            <trias:Mode><trias:PtMode>urbanRail</trias:PtMode></trias:Mode>
            <trias:PublishedLineName><trias:Text>S2</trias:Text></trias:PublishedLineName>
          </trias:Service>
        </trias:TimedLeg>
      </trias:TripLeg>
    </trias:Trip>
  </trias:TripResult>
</trias:TripResponse>";

fn location(name: &str, id: &str, probability: &str) -> String {
    format!(
        r"<trias:Location>
            <trias:Location>
              <trias:StopPoint>
                <trias:StopPointRef>{id}</trias:StopPointRef>
                <trias:StopPointName><trias:Text>{name}</trias:Text></trias:StopPointName>
              </trias:StopPoint>
              <trias:LocationName><trias:Text>Stuttgart</trias:Text></trias:LocationName>
              <trias:GeoPosition>
                <trias:Longitude>9.18173</trias:Longitude>
                <trias:Latitude>48.78432</trias:Latitude>
              </trias:GeoPosition>
            </trias:Location>
            <trias:Complete>true</trias:Complete>
            <trias:Probability>{probability}</trias:Probability>
          </trias:Location>"
    )
}

async fn mount_xml(server: &MockServer, request_kind: &str, body: String) {
    Mock::given(method("POST"))
        .and(path("/trias"))
        .and(header("content-type", "application/xml"))
        .and(body_string_contains(request_kind))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_get_departures_success() {
    let server = MockServer::start().await;
    mount_xml(&server, "StopEventRequest", delivery(STOP_EVENT_RESPONSE)).await;

    let client = HttpTriasClient::new(&config_for_mock(&server.uri())).unwrap();
    let departures = client
        .get_departures("de:08111:6115", Some(1), None)
        .await
        .unwrap();

    assert_eq!(departures.len(), 1);
    let departure = &departures[0];
    assert_eq!(departure.mode, PtMode::Rail);
    assert_eq!(departure.published_line_name, "S1");
    assert_eq!(departure.stop_point_name, "Hauptbahnhof (tief)");
    assert_eq!(departure.planned_bay.as_deref(), Some("3"));
    assert_eq!(departure.current_delay.unwrap().to_string(), "0:02:00");
}

#[tokio::test]
async fn test_request_carries_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/trias"))
        .and(body_string_contains("<siri:RequestorRef>test-requestor</siri:RequestorRef>"))
        .and(body_string_contains("version=\"1.1\""))
        .and(body_string_contains("<NumberOfResults>2</NumberOfResults>"))
        .respond_with(ResponseTemplate::new(200).set_body_string(delivery(STOP_EVENT_RESPONSE)))
        .expect(1)
        .mount(&server)
        .await;

    let client = HttpTriasClient::new(&config_for_mock(&server.uri())).unwrap();
    // departure_limit defaults to 2
    let result = client.get_departures("de:08111:6115", None, None).await;
    assert!(result.is_ok());
}

#[tokio::test]
async fn test_get_trip_single_bare_leg() {
    let server = MockServer::start().await;
    mount_xml(&server, "TripRequest", delivery(TRIP_RESPONSE)).await;

    let client = HttpTriasClient::new(&config_for_mock(&server.uri())).unwrap();
    let trips = client
        .get_trip("de:08111:6115", "de:08111:2201", Some(1), None)
        .await
        .unwrap();

    assert_eq!(trips.len(), 1);
    let trip = &trips[0];
    assert_eq!(trip.interchanges, 0);
    assert_eq!(trip.duration.to_string(), "0:24:00");
    assert_eq!(trip.legs.len(), 1);

    let LegKind::Timed(leg) = &trip.legs[0].kind else {
        panic!("expected a timed leg");
    };
    assert_eq!(leg.mode, PtMode::UrbanRail);
    assert_eq!(trip.start_timetabled_time, Some(leg.entry_timetabled_time));
    assert_eq!(trip.delay.unwrap().to_string(), "0:01:00");
}

#[tokio::test]
async fn test_search_locations() {
    let server = MockServer::start().await;
    let body = delivery(&format!(
        "<trias:LocationInformationResponse>{}{}</trias:LocationInformationResponse>",
        location("Hauptbahnhof", "de:08111:6115", "0.95"),
        location("Hauptbahnhof (tief)", "de:08111:6118", "0.4"),
    ));
    mount_xml(&server, "LocationInformationRequest", body).await;

    let client = HttpTriasClient::new(&config_for_mock(&server.uri())).unwrap();
    let matches = client.search_locations("Hauptbahnhof", 4).await.unwrap();

    assert_eq!(matches.len(), 2);
    assert_eq!(matches.get("Stuttgart, Hauptbahnhof"), Some("de:08111:6115"));
    assert_eq!(matches.get("Stuttgart, Hauptbahnhof (tief)"), Some("de:08111:6118"));
}

#[tokio::test]
async fn test_search_locations_keeps_service_order() {
    let server = MockServer::start().await;
    let body = delivery(&format!(
        "<trias:LocationInformationResponse>{}{}{}</trias:LocationInformationResponse>",
        location("Zoo", "de:08111:1", "0.9"),
        location("Nord", "de:08111:2", "0.6"),
        location("Arena", "de:08111:3", "0.3"),
    ));
    mount_xml(&server, "LocationInformationRequest", body).await;

    let client = HttpTriasClient::new(&config_for_mock(&server.uri())).unwrap();
    let matches = client.search_locations("Stuttgart", 4).await.unwrap();

    assert_eq!(
        matches.names().collect::<Vec<_>>(),
        ["Stuttgart, Zoo", "Stuttgart, Nord", "Stuttgart, Arena"]
    );
}

#[tokio::test]
async fn test_single_result_low_probability_rejected() {
    let server = MockServer::start().await;
    let body = delivery(&format!(
        "<trias:LocationInformationResponse>{}</trias:LocationInformationResponse>",
        location("Nordbahnhof", "de:08111:6056", "0.5"),
    ));
    mount_xml(&server, "LocationInformationRequest", body).await;

    let client = HttpTriasClient::new(&config_for_mock(&server.uri())).unwrap();
    let err = client.search_locations("Hauptbahnhof", 1).await.unwrap_err();

    match &err {
        TriasError::InvalidLocationName { probability, .. } => {
            assert!((probability - 0.5).abs() < f64::EPSILON);
        },
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.class(), ErrorClass::Validation);

    let station = client.get_station_data("Hauptbahnhof").await;
    assert!(matches!(station, Err(TriasError::InvalidLocationName { .. })));
}

#[tokio::test]
async fn test_get_station_data_and_id() {
    let server = MockServer::start().await;
    let body = delivery(&format!(
        "<trias:LocationInformationResponse>{}</trias:LocationInformationResponse>",
        location("Hauptbahnhof", "de:08111:6115", "0.95"),
    ));
    mount_xml(&server, "LocationInformationRequest", body).await;

    let client = HttpTriasClient::new(&config_for_mock(&server.uri())).unwrap();
    let station = client.get_station_data("de:08111:6115").await.unwrap();
    assert_eq!(station.stop_point_name, "Hauptbahnhof");
    assert_eq!(station.latitude, Some(48.78432));
    assert_eq!(station.longitude, Some(9.18173));

    let id = client.get_station_id("Hauptbahnhof").await.unwrap();
    assert_eq!(id, "de:08111:6115");
}

#[tokio::test]
async fn test_get_station_data_without_results() {
    let server = MockServer::start().await;
    mount_xml(
        &server,
        "LocationInformationRequest",
        delivery("<trias:LocationInformationResponse/>"),
    )
    .await;

    let client = HttpTriasClient::new(&config_for_mock(&server.uri())).unwrap();
    match client.get_station_data("Atlantis").await {
        Err(TriasError::InvalidLocationName {
            requested,
            probability,
            ..
        }) => {
            assert_eq!(requested, "Atlantis");
            assert!(probability.abs() < f64::EPSILON);
        },
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_api_error_with_status_200() {
    let server = MockServer::start().await;
    let body = delivery(
        r"<trias:LocationInformationResponse>
            <trias:ErrorMessage>
              <trias:Code>-8011</trias:Code>
              <trias:Text><trias:Text>LOCATION_NORESULTS</trias:Text></trias:Text>
            </trias:ErrorMessage>
          </trias:LocationInformationResponse>",
    );
    mount_xml(&server, "LocationInformationRequest", body).await;

    let client = HttpTriasClient::new(&config_for_mock(&server.uri())).unwrap();
    let err = client.search_locations("xyz", 4).await.unwrap_err();

    match &err {
        TriasError::Api { message } => assert_eq!(message, "LOCATION_NORESULTS"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.class(), ErrorClass::Protocol);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_server_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/trias"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&server)
        .await;

    let client = HttpTriasClient::new(&config_for_mock(&server.uri())).unwrap();
    let err = client
        .get_departures("de:08111:6115", None, None)
        .await
        .unwrap_err();

    match &err {
        TriasError::Http { status, body } => {
            assert_eq!(*status, 500);
            assert_eq!(body, "Internal Server Error");
        },
        other => panic!("unexpected error: {other}"),
    }
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_malformed_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/trias"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>Gateway"))
        .mount(&server)
        .await;

    let client = HttpTriasClient::new(&config_for_mock(&server.uri())).unwrap();
    let result = client.get_trip("de:1", "de:2", None, None).await;
    assert!(matches!(result, Err(TriasError::ParseError(_))));
}

#[tokio::test]
async fn test_get_trip_info() {
    let server = MockServer::start().await;
    let body = delivery(
        r"<trias:TripInfoResponse>
            <trias:TripInfoResult>
              <trias:PreviousCall>
                <trias:StopPointRef>de:08111:6115</trias:StopPointRef>
                <trias:StopPointName><trias:Text>Hauptbahnhof</trias:Text></trias:StopPointName>
                <trias:ServiceDeparture><trias:TimetabledTime>2024-03-01T07:10:00Z</trias:TimetabledTime></trias:ServiceDeparture>
              </trias:PreviousCall>
              <trias:OnwardCall>
                <trias:StopPointRef>de:08111:2201</trias:StopPointRef>
                <trias:StopPointName><trias:Text>Universität</trias:Text></trias:StopPointName>
                <trias:ServiceArrival><trias:TimetabledTime>2024-03-01T07:34:00Z</trias:TimetabledTime></trias:ServiceArrival>
              </trias:OnwardCall>
              <trias:Service>
                <trias:Mode><trias:PtMode>urbanRail</trias:PtMode></trias:Mode>
                <trias:PublishedLineName><trias:Text>S2</trias:Text></trias:PublishedLineName>
              </trias:Service>
            </trias:TripInfoResult>
          </trias:TripInfoResponse>",
    );
    mount_xml(&server, "TripInfoRequest", body).await;

    let client = HttpTriasClient::new(&config_for_mock(&server.uri())).unwrap();
    let info = client
        .get_trip_info("vvs:10002:E:H:j24:123", "2024-03-01")
        .await
        .unwrap();

    assert_eq!(info.line_name.as_deref(), Some("S2"));
    assert_eq!(info.calls.len(), 2);
    assert_eq!(info.calls[1].stop_point_name, "Universität");
}

#[tokio::test]
async fn test_test_connection() {
    let server = MockServer::start().await;
    let body = delivery(&format!(
        "<trias:LocationInformationResponse>{}</trias:LocationInformationResponse>",
        location("Bahnhof", "de:1", "0.1"),
    ));
    mount_xml(&server, "LocationInformationRequest", body).await;

    let client = HttpTriasClient::new(&config_for_mock(&server.uri())).unwrap();
    // the probability check does not apply here
    assert!(client.test_connection().await.is_ok());
}

#[tokio::test]
async fn test_connection_refused() {
    let client = HttpTriasClient::new(&config_for_mock("http://127.0.0.1:9")).unwrap();
    let err = client.test_connection().await.unwrap_err();
    assert!(matches!(err, TriasError::ConnectionFailed(_)));
    assert_eq!(err.class(), ErrorClass::Transport);
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/trias"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(delivery(STOP_EVENT_RESPONSE))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = TriasConfig {
        timeout_secs: 1,
        ..config_for_mock(&server.uri())
    };
    let client = HttpTriasClient::new(&config).unwrap();
    let err = client
        .get_departures("de:08111:6115", Some(1), None)
        .await
        .unwrap_err();

    assert!(matches!(err, TriasError::Timeout { timeout_secs: 1 }));
    assert!(err.is_retryable());
    assert_eq!(err.class(), ErrorClass::Transport);
}

//! Envelope handling and HTTP transport
//!
//! Every request travels inside the same envelope:
//!
//! ```text
//! Trias(version=1.1)
//!   ServiceRequest
//!     siri:RequestTimestamp   Zulu time of sending
//!     siri:RequestorRef       API key
//!     RequestPayload          one of the four request elements
//! ```
//!
//! Answers come back as `Trias/ServiceDelivery/DeliveryPayload`. Errors the
//! service reports inside a 200 response are raised here, before any
//! normalizer sees the payload.

use std::time::Duration;

use chrono_tz::Tz;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::TriasConfig;
use crate::error::TriasError;
use crate::request::TriasRequest;
use crate::time::zulu_now;
use crate::xml::{self, XmlBuilder, XmlValue};

/// TRIAS namespace
pub const TRIAS_NS: &str = "http://www.vdv.de/trias";
/// SIRI namespace used for the envelope header fields
pub const SIRI_NS: &str = "http://www.siri.org.uk/siri";
/// XML schema instance namespace
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
/// Protocol version sent in the envelope
pub const TRIAS_VERSION: &str = "1.1";

const DELIVERY_PATH: [&str; 3] = ["Trias", "ServiceDelivery", "DeliveryPayload"];

/// Response containers scanned for `ErrorMessage`, in this order
const RESPONSE_CONTAINERS: [&str; 4] = [
    "StopEventResponse",
    "TripResponse",
    "TripInfoResponse",
    "LocationInformationResponse",
];

/// Wrap a request payload in the TRIAS envelope
///
/// # Errors
///
/// Returns [`TriasError::InvalidParameter`] for invalid request arguments.
pub fn build_envelope(
    request: &TriasRequest,
    timestamp: &str,
    requestor_ref: &str,
    zone: Tz,
) -> Result<String, TriasError> {
    let mut xml = XmlBuilder::new();
    xml.declaration()?
        .open_with(
            "Trias",
            &[
                ("version", TRIAS_VERSION),
                ("xmlns", TRIAS_NS),
                ("xmlns:siri", SIRI_NS),
                ("xmlns:xsi", XSI_NS),
            ],
        )?
        .open("ServiceRequest")?
        .leaf("siri:RequestTimestamp", timestamp)?
        .leaf("siri:RequestorRef", requestor_ref)?
        .open("RequestPayload")?;
    request.write_into(&mut xml, zone)?;
    xml.close("RequestPayload")?
        .close("ServiceRequest")?
        .close("Trias")?;
    xml.finish()
}

/// Parse a response body down to its `DeliveryPayload`
///
/// # Errors
///
/// - [`TriasError::ParseError`] for malformed XML or a missing payload
/// - [`TriasError::Api`] if the service reported an error message
pub fn parse_delivery(body: &str) -> Result<XmlValue, TriasError> {
    let payload = xml::parse(body)?
        .into_path(&DELIVERY_PATH)
        .ok_or_else(|| TriasError::missing(&DELIVERY_PATH.join("/")))?;

    if let Some(message) = error_message(&payload) {
        return Err(TriasError::Api {
            message: message.to_string(),
        });
    }

    Ok(payload)
}

/// First `ErrorMessage/Text/Text` found in a response container
#[must_use]
pub fn error_message(payload: &XmlValue) -> Option<&str> {
    RESPONSE_CONTAINERS.iter().find_map(|container| {
        payload.text_at(&[*container, "ErrorMessage", "Text", "Text"])
    })
}

/// HTTP transport for one TRIAS endpoint
pub struct TriasTransport {
    client: Client,
    endpoint: Url,
    requestor_ref: SecretString,
    timeout_secs: u64,
    zone: Tz,
}

impl std::fmt::Debug for TriasTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriasTransport")
            .field("endpoint", &self.endpoint.as_str())
            .field("requestor_ref", &"[REDACTED]")
            .field("timeout_secs", &self.timeout_secs)
            .field("zone", &self.zone)
            .finish()
    }
}

impl TriasTransport {
    /// Create a transport from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the URL, key or zone is invalid, or the HTTP
    /// client cannot be initialized.
    pub fn new(config: &TriasConfig) -> Result<Self, TriasError> {
        let endpoint = config.endpoint()?;
        let requestor_ref = SecretString::from(config.requestor_ref()?.to_string());
        let zone = config.zone()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("trias-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TriasError::ConnectionFailed(e.to_string()))?;

        Ok(Self {
            client,
            endpoint,
            requestor_ref,
            timeout_secs: config.timeout_secs,
            zone,
        })
    }

    /// Endpoint requests are posted to
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn send_error(&self, error: &reqwest::Error) -> TriasError {
        if error.is_timeout() {
            TriasError::Timeout {
                timeout_secs: self.timeout_secs,
            }
        } else {
            TriasError::ConnectionFailed(error.to_string())
        }
    }

    /// Send a request and return the checked `DeliveryPayload`
    ///
    /// # Errors
    ///
    /// Returns transport, HTTP, parse or API errors.
    #[instrument(skip(self, request), fields(kind = request.kind()))]
    pub async fn send(&self, request: &TriasRequest) -> Result<XmlValue, TriasError> {
        let envelope = build_envelope(
            request,
            &zulu_now(),
            self.requestor_ref.expose_secret(),
            self.zone,
        )?;

        debug!(url = %self.endpoint, bytes = envelope.len(), "Posting TRIAS request");

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/xml")
            .body(envelope)
            .send()
            .await
            .map_err(|e| self.send_error(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                self.send_error(&e)
            } else {
                TriasError::ParseError(e.to_string())
            }
        })?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "TRIAS endpoint returned an error status");
            return Err(TriasError::Http {
                status: status.as_u16(),
                body,
            });
        }

        parse_delivery(&body).inspect_err(|e| debug!(error = %e, "Unusable TRIAS response"))
    }
}

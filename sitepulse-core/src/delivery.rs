//! Delivery of built envelopes
//!
//! [`send`] never blocks and never fails outward. Transport results come
//! back through [`settle`], which turns them into a [`DeliveryReport`] and
//! applies the debug-gated warning policy. No retry, no queue.

use crate::config::TrackerConfig;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::envelope::Envelope;
use crate::error::Result;
use crate::outcome::{DeliveryReport, Suppression, TrackOutcome};
use crate::transport::{BeaconRequest, Transport};

/// Hand `envelope` to the transport unless the endpoint is empty
pub fn send(
    envelope: &Envelope,
    config: &TrackerConfig,
    transport: &dyn Transport,
    diagnostics: &Diagnostics,
) -> TrackOutcome {
    if !config.can_deliver() {
        diagnostics.debug_warn(
            config.debug,
            WarningKind::EmptyEndpoint,
            "no endpoint configured, event not sent",
        );
        return TrackOutcome::Suppressed(Suppression::EmptyEndpoint);
    }

    let body = match envelope.to_json() {
        Ok(body) => body,
        Err(err) => {
            // Reported like a transport failure
            settle(Err(err.into()), config.debug, diagnostics);
            return TrackOutcome::Dispatched;
        }
    };

    if config.debug {
        tracing::info!(
            endpoint = %config.endpoint,
            envelope = %String::from_utf8_lossy(&body),
            "[sitepulse] sending event"
        );
    }

    let debug = config.debug;
    let sink = diagnostics.clone();
    transport.dispatch(
        BeaconRequest::json(config.endpoint.clone(), body),
        Box::new(move |result| {
            settle(result, debug, &sink);
        }),
    );
    TrackOutcome::Dispatched
}

/// Swallow-and-log policy for a settled transmission
pub fn settle(result: Result<()>, debug: bool, diagnostics: &Diagnostics) -> DeliveryReport {
    match result {
        Ok(()) => {
            tracing::trace!("[sitepulse] event delivered");
            DeliveryReport::Delivered
        }
        Err(err) => {
            let message = err.to_string();
            diagnostics.debug_warn(
                debug,
                WarningKind::TransportFailed,
                format!("failed to send event: {}", message),
            );
            DeliveryReport::Failed(message)
        }
    }
}

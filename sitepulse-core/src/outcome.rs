//! Results of tracking calls
//!
//! Tracking never fails outward; these values say what happened instead.

use std::fmt;

/// What a tracking call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    /// An envelope was handed to the transport
    Dispatched,
    /// The session is live but delivery was skipped
    Suppressed(Suppression),
    /// The call was a no-op because of caller misuse
    Rejected(Misuse),
    /// The tracker has no browser context and does nothing
    Inert,
}

impl TrackOutcome {
    pub fn is_dispatched(&self) -> bool {
        matches!(self, TrackOutcome::Dispatched)
    }
}

impl fmt::Display for TrackOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackOutcome::Dispatched => f.write_str("dispatched"),
            TrackOutcome::Suppressed(Suppression::EmptyEndpoint) => {
                f.write_str("suppressed: no endpoint configured")
            }
            TrackOutcome::Rejected(Misuse::NoActiveSession) => {
                f.write_str("rejected: no active session")
            }
            TrackOutcome::Rejected(Misuse::EmptyEventName) => {
                f.write_str("rejected: empty event name")
            }
            TrackOutcome::Inert => f.write_str("inert: no browser context"),
        }
    }
}

/// Why a live session skipped delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suppression {
    EmptyEndpoint,
}

/// Caller mistakes that turn a tracking call into a no-op
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Misuse {
    NoActiveSession,
    EmptyEventName,
}

/// Final state of one transmission, observed only by the delivery continuation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryReport {
    Delivered,
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(TrackOutcome::Dispatched.to_string(), "dispatched");
        assert_eq!(
            TrackOutcome::Suppressed(Suppression::EmptyEndpoint).to_string(),
            "suppressed: no endpoint configured"
        );
        assert!(TrackOutcome::Dispatched.is_dispatched());
        assert!(!TrackOutcome::Inert.is_dispatched());
    }
}

//! Conservation check for a single ledger sync.
//!
//! Every unit that entered or left the containers during a sync must be
//! accounted for:
//!
//! ```text
//! new_amount - old_amount == contributions + interval_amount + external_delta
//! ```
//!
//! The check only holds when the deferred total fit inside the containers.
//! A clamped sync dropped part of the intents by design and is reported as
//! [`ConservationResult::Clamped`] instead of an anomaly.

use crate::{LedgerAnomaly, SyncRecord};

/// Absolute tolerance of the balance check.
pub const CONSERVATION_TOLERANCE: f64 = 1e-9;

/// The result of a conservation check.
#[derive(Debug, Clone, PartialEq)]
pub enum ConservationResult {
    /// The sync balanced.
    Balanced,
    /// The deferred amount was clamped; the balance is not expected to hold.
    Clamped,
    /// The sync did not balance.
    Anomaly(LedgerAnomaly),
}

/// Verify that a sync of `resource` balanced.
pub fn verify_sync(resource: &str, record: &SyncRecord) -> ConservationResult {
    if record.clamped {
        return ConservationResult::Clamped;
    }

    let expected_delta = record.contributions + record.interval_amount + record.external_delta;
    let actual_delta = record.new_amount - record.old_amount;

    if (expected_delta - actual_delta).abs() <= CONSERVATION_TOLERANCE {
        ConservationResult::Balanced
    } else {
        ConservationResult::Anomaly(LedgerAnomaly {
            resource: resource.to_owned(),
            expected_delta,
            actual_delta,
            message: format!(
                "LEDGER_ANOMALY for {resource}: expected change {expected_delta}, observed {actual_delta}",
            ),
        })
    }
}

//! Error types for the `flowsync-world` crate.
//!
//! All fallible operations in this crate return [`WorldError`] through the
//! standard [`Result`] type alias.

/// Errors that can occur while building or converting vessel parts.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorldError {
    /// A stored amount is negative, not finite, or above its maximum.
    #[error("invalid amount for {resource}: {amount} of {max_amount}")]
    InvalidAmount {
        /// Resource name.
        resource: String,
        /// Offending amount.
        amount: f64,
        /// Maximum amount of the container.
        max_amount: f64,
    },

    /// A serialized part is missing a required field.
    #[error("snapshot is missing field `{field}`")]
    MissingField {
        /// Name of the missing field.
        field: &'static str,
    },

    /// A serialized part has a field of the wrong shape.
    #[error("snapshot field `{field}` is malformed: {reason}")]
    MalformedField {
        /// Name of the malformed field.
        field: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A part index does not exist on the vessel.
    #[error("part index {index} out of range ({count} parts)")]
    PartNotFound {
        /// Requested index.
        index: usize,
        /// Number of parts on the vessel.
        count: usize,
    },
}

/// Validate an amount/max pair before it is stored in a container.
pub(crate) fn check_amount(resource: &str, amount: f64, max_amount: f64) -> Result<(), WorldError> {
    let valid = amount.is_finite() && max_amount.is_finite() && amount >= 0.0 && amount <= max_amount;
    if valid {
        Ok(())
    } else {
        Err(WorldError::InvalidAmount {
            resource: resource.to_owned(),
            amount,
            max_amount,
        })
    }
}

use thiserror::Error;

/// Failures reported by the differentiation and integration routines.
///
/// Every variant is raised before a result is produced; no operation returns a
/// partial value alongside an error.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CalculusError {
    #[error("delta is zero")]
    DeltaIsZero,

    #[error("precision must be a non-negative number, got {0}")]
    InvalidPrecision(f64),

    #[error(
        "integration did not converge after {rounds} refinement rounds \
         ({intervals} intervals, last relative change {relative_change:e})"
    )]
    DidNotConverge {
        rounds: u32,
        intervals: usize,
        relative_change: f64,
    },

    #[error("computation was cancelled")]
    Cancelled,

    /// Guards scalar types whose `FromPrimitive::from_usize` can fail. `f32`
    /// and `f64` always convert, so they never produce it.
    #[error("interval count {0} is not representable in the scalar type")]
    UnrepresentableIntervalCount(usize),
}

#[cfg(test)]
mod tests {
    use super::CalculusError;

    #[test]
    fn messages_name_the_failure() {
        assert_eq!(CalculusError::DeltaIsZero.to_string(), "delta is zero");
        assert!(CalculusError::InvalidPrecision(-1.0)
            .to_string()
            .contains("-1"));
        let err = CalculusError::DidNotConverge {
            rounds: 3,
            intervals: 8,
            relative_change: 0.5,
        };
        let message = err.to_string();
        assert!(message.contains("3 refinement rounds"), "got {message}");
        assert!(message.contains("8 intervals"), "got {message}");
        assert!(CalculusError::UnrepresentableIntervalCount(16)
            .to_string()
            .contains("16"));
    }
}

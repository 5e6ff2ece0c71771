use thiserror::Error;

/// Error kinds shared by every crate that touches the repository directly,
/// matching the taxonomy in the processing pipeline's error handling design.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("storage error: {0}")]
    Storage(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("cancelled")]
    Cancelled,
}

impl CoreError {
    /// Cancellation errors are checked before logging at warn level, to
    /// avoid shutdown noise.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancelled_is_detected() {
        assert!(CoreError::Cancelled.is_cancelled());
        assert!(!CoreError::NotFound("x".into()).is_cancelled());
    }
}

// Outcome reporting: every facade call returns a `Result` and mirrors failures to the log.

use crate::error::Result;

const PREFIX: &str = "[PaperDB]";

/// Log an error outcome on the side channel and hand the outcome back unchanged.
pub fn reported<T>(outcome: Result<T>) -> Result<T> {
    if let Err(e) = &outcome {
        log::error!("{PREFIX} {e}");
    }
    outcome
}

/// Log a success confirmation.
pub fn confirm(message: &str) {
    log::info!("{PREFIX} {message}");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PaperDbError;

    #[test]
    fn test_reported_passes_success_through() {
        let outcome: Result<u32> = Ok(7);
        assert_eq!(reported(outcome).unwrap(), 7);
    }

    #[test]
    fn test_reported_passes_error_through() {
        let outcome: Result<u32> = Err(PaperDbError::CollectionNotFound("Users".into()));
        let err = reported(outcome).unwrap_err();
        assert_eq!(err.to_string(), "Collection Users not found.");
    }
}

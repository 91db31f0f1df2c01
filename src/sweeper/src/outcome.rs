//! Classification of provider delete results against the retry policy.

use crate::store::DeleteResult;

/// Cause recorded when a key uses up its attempt budget without succeeding.
pub const RETRY_BUDGET_EXHAUSTED: &str = "retry budget exhausted";

/// What one delete attempt means for the key's fate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The call removed the object.
    Deleted,
    /// The object was already gone. Counts as deleted: the goal is absence.
    NotFound,
    /// Transient failure worth retrying (rate limit, timeout, 5xx).
    Retryable(String),
    /// Failure no retry can fix (auth, bad request, other 4xx).
    Permanent(String),
}

impl Outcome {
    /// True when the key needs no further attempts.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Outcome::Retryable(_))
    }
}

/// Map a provider result onto the retry policy.
pub fn classify(result: &DeleteResult) -> Outcome {
    match result {
        DeleteResult::Ok => Outcome::Deleted,
        DeleteResult::NotFound => Outcome::NotFound,
        DeleteResult::RateLimited => Outcome::Retryable("rate limited".to_string()),
        DeleteResult::Timeout => Outcome::Retryable("timed out".to_string()),
        DeleteResult::ServerError(code) => {
            Outcome::Retryable(format!("server error (status {code})"))
        }
        DeleteResult::Unauthorized => Outcome::Permanent("unauthorized".to_string()),
        DeleteResult::ClientError(code) => {
            Outcome::Permanent(format!("client error (status {code})"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_variants_are_terminal() {
        assert_eq!(classify(&DeleteResult::Ok), Outcome::Deleted);
        assert_eq!(classify(&DeleteResult::NotFound), Outcome::NotFound);
        assert!(classify(&DeleteResult::Ok).is_terminal());
        assert!(classify(&DeleteResult::NotFound).is_terminal());
    }

    #[test]
    fn test_transient_variants_are_retryable() {
        assert!(matches!(
            classify(&DeleteResult::RateLimited),
            Outcome::Retryable(_)
        ));
        assert!(matches!(
            classify(&DeleteResult::Timeout),
            Outcome::Retryable(_)
        ));
        assert!(matches!(
            classify(&DeleteResult::ServerError(503)),
            Outcome::Retryable(_)
        ));
        assert!(!classify(&DeleteResult::RateLimited).is_terminal());
    }

    #[test]
    fn test_client_side_failures_are_permanent() {
        assert_eq!(
            classify(&DeleteResult::Unauthorized),
            Outcome::Permanent("unauthorized".to_string())
        );
        assert_eq!(
            classify(&DeleteResult::ClientError(400)),
            Outcome::Permanent("client error (status 400)".to_string())
        );
        assert!(classify(&DeleteResult::ClientError(404)).is_terminal());
    }
}

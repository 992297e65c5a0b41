use crate::error::ShortenerError;
use std::time::Duration;

/// The operation a latency sample belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ResolveByCode,
    ResolveOrCreate,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ResolveByCode => "resolve_by_code",
            Operation::ResolveOrCreate => "resolve_or_create",
        }
    }
}

/// How an operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Ok,
    InvalidInput,
    NotFound,
    BackendUnavailable,
}

impl Outcome {
    pub fn of<T>(result: &Result<T, ShortenerError>) -> Self {
        match result {
            Ok(_) => Outcome::Ok,
            Err(ShortenerError::InvalidInput(_)) => Outcome::InvalidInput,
            Err(ShortenerError::NotFound(_)) => Outcome::NotFound,
            Err(ShortenerError::BackendUnavailable(_)) => Outcome::BackendUnavailable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::InvalidInput => "invalid_input",
            Outcome::NotFound => "not_found",
            Outcome::BackendUnavailable => "backend_unavailable",
        }
    }
}

/// Receives one latency sample per shortener operation.
///
/// Built once at process start and handed to the service; implementations
/// must be cheap because they run on the request path.
pub trait LatencyObserver: Send + Sync + 'static {
    fn observe(&self, operation: Operation, outcome: Outcome, elapsed: Duration);
}

/// An observer that discards every sample.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LatencyObserver for NoopObserver {
    fn observe(&self, _operation: Operation, _outcome: Outcome, _elapsed: Duration) {}
}

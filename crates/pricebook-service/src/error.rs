use futures::channel::oneshot;
use thiserror::Error;

/// An error that happens while obtaining the price book.
///
/// This error enum is intended for broadcasting to every caller joined on an
/// in-flight fetch, hence it is `Clone` and carries no error sources.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PricingError {
    /// Pricing is disabled, either by local configuration or confirmed by
    /// the server.
    ///
    /// This is terminal for the process: callers should not retry.
    #[error("pricing is disabled")]
    Disabled,
    /// The server reported that the pricing feature is unavailable.
    ///
    /// The attached code is the status code of the upstream response.
    /// Observing this error latches the service into the disabled state.
    #[error("pricing service unavailable (status {0})")]
    ServiceUnavailable(u16),
    /// The price book could not be fetched due to a transient problem,
    /// like connection loss, DNS resolution, or a 5xx server response.
    ///
    /// Cache state is left unmodified on this error, so the next call
    /// retries from scratch.
    #[error("fetch failed: {0}")]
    Fetch(String),
}

impl From<oneshot::Canceled> for PricingError {
    fn from(_: oneshot::Canceled) -> Self {
        // Only happens when the runtime shuts down underneath an in-flight
        // fetch.
        tracing::error!("price book fetch task dropped before completing");
        Self::Fetch("fetch task dropped".to_owned())
    }
}

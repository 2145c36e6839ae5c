//! Top-level error boundary of the composition root.

use crate::error::Result;
use std::future::Future;

/// Reports failures of application operations in one place.
///
/// The error is logged once, with its [`kind`](crate::TesseraError::kind),
/// and handed back to the caller unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExceptionsZone;

impl ExceptionsZone {
    /// Awaits `operation`, reporting its error if it fails.
    pub async fn run<T, F>(operation: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        Self::report(operation.await)
    }

    pub fn report<T>(result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            tracing::error!(kind = %e.kind(), "{}", e);
        }
        result
    }
}

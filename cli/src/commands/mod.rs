//! Command implementations

pub mod provision;
pub mod undo;

use std::fmt;

use anyhow::Result;

use crate::application::ports::{Credentials, PlatformGateway, ProgressReporter, Session};
use crate::domain::error::FleetError;
use crate::domain::report::Report;

/// A run that stopped part-way. Displays as the underlying error and keeps
/// the entries recorded before the abort.
#[derive(Debug)]
pub struct Aborted {
    pub report: Report,
    pub error: FleetError,
}

impl fmt::Display for Aborted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.error.fmt(f)
    }
}

impl std::error::Error for Aborted {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.error)
    }
}

/// Open a platform session, reporting progress.
///
/// # Errors
///
/// Returns `FleetError::Authentication` if the credentials are rejected or
/// the platform cannot be reached.
pub async fn authenticate(
    gateway: &impl PlatformGateway,
    credentials: &Credentials,
    reporter: &impl ProgressReporter,
) -> Result<Session> {
    reporter.step(&format!("authenticating as {}", credentials.user));
    let session = gateway
        .authenticate(credentials)
        .await
        .map_err(FleetError::Authentication)?;
    tracing::debug!(?session, "session opened");
    reporter.success(&format!("authenticated as {}", session.principal()));
    Ok(session)
}

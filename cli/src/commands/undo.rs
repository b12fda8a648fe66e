//! `labfleet --undo` — tear the fleet down.

use anyhow::Result;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::ports::{PlatformGateway, Session};
use crate::application::services::deprovision::deprovision;
use crate::domain::fleet::TeardownRequest;

/// Tear the fleet down and print the report.
///
/// Exits with failure, after the report, when a vnet, pool, or zone could not
/// be removed.
///
/// # Errors
///
/// Returns an error if the target range cannot be computed or the report
/// cannot be rendered.
pub async fn run(
    app: &AppContext,
    gateway: &impl PlatformGateway,
    session: &Session,
    request: &TeardownRequest,
) -> Result<ExitCode> {
    let reporter = app.reporter();
    let report = deprovision(gateway, session, request, &reporter).await;
    reporter.finish();
    let report = report?;

    app.renderer().render_report(&report)?;

    if report.has_infrastructure_failure() {
        app.output
            .error("some shared infrastructure could not be removed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

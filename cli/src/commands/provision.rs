//! `labfleet` without `--undo` — create the fleet.

use anyhow::Result;
use std::process::ExitCode;

use crate::app::AppContext;
use crate::application::ports::{PlatformGateway, Session};
use crate::application::services::provision::provision_into;
use crate::commands::Aborted;
use crate::domain::fleet::ProvisionRequest;
use crate::domain::report::{Operation, Report};

/// Provision the fleet and print the report.
///
/// Per-VM failures are listed in the report and do not change the exit code.
///
/// # Errors
///
/// Returns [`Aborted`] if provisioning aborts: a lookup or creation of pool,
/// zone, or vnet failed, or a precondition does not hold. In human mode the
/// partial report is printed first.
pub async fn run(
    app: &AppContext,
    gateway: &impl PlatformGateway,
    session: &Session,
    request: &ProvisionRequest,
) -> Result<ExitCode> {
    let reporter = app.reporter();
    let mut report = Report::new(Operation::Provision);
    let outcome = provision_into(gateway, session, request, &reporter, &mut report).await;
    reporter.finish();
    if let Err(error) = outcome {
        app.renderer().render_partial_report(&report);
        return Err(Aborted { report, error }.into());
    }

    app.renderer().render_report(&report)?;

    let failed = report.failures().count();
    if failed > 0 {
        app.output
            .warn(&format!("{failed} VM step(s) failed; rerun to retry them"));
    }
    Ok(ExitCode::SUCCESS)
}

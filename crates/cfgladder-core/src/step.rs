use crate::{Logger, ResourceScope, Storage};

/// Generic failure code returned by steps that convert an error into a result.
pub const STEP_FAILURE_CODE: i32 = -1;

/// Everything a step may touch while it runs.
pub struct StepContext<'a, 'r> {
    pub storage: &'a dyn Storage,
    pub logger: &'a dyn Logger,
    pub resources: &'a mut ResourceScope<'r>,
}

/// One rung of the upgrade ladder.
///
/// `perform` returns `0` on success and any other value on failure. The value
/// is surfaced verbatim as the run's exit status, so implementations must log
/// their own errors and never panic on bad input.
pub trait UpgradeStep {
    fn name(&self) -> &str;

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32;
}

/// Logs `err` with its cause chain and yields [`STEP_FAILURE_CODE`].
pub fn report_step_failure(logger: &dyn Logger, what: &str, err: &anyhow::Error) -> i32 {
    logger.error(&format!("{what}: {err:#}"));
    STEP_FAILURE_CODE
}

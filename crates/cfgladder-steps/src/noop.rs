use cfgladder_core::{StepContext, UpgradeStep};

/// Moves the marker forward without touching the configuration. Bridges
/// releases that changed nothing in the configuration format.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOp;

impl UpgradeStep for NoOp {
    fn name(&self) -> &str {
        "noop"
    }

    fn perform(&self, _ctx: &mut StepContext<'_, '_>) -> i32 {
        0
    }
}

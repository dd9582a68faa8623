use cfgladder_core::{StepContext, UpgradeStep};

/// Several steps behind one ledger rung. Stops at the first non-zero code and
/// returns it.
pub struct Sequence {
    steps: Vec<Box<dyn UpgradeStep>>,
    name: String,
}

impl Sequence {
    pub fn new(steps: Vec<Box<dyn UpgradeStep>>) -> Self {
        let name = steps
            .iter()
            .map(|step| step.name())
            .collect::<Vec<_>>()
            .join("+");
        Self { steps, name }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl UpgradeStep for Sequence {
    fn name(&self) -> &str {
        &self.name
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        for step in &self.steps {
            let code = step.perform(ctx);
            if code != 0 {
                return code;
            }
        }
        0
    }
}

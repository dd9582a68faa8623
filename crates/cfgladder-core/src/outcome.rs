use crate::STEP_FAILURE_CODE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed { final_version: String, applied: usize },
    AlreadyLatest { version: String },
    StepFailed { label: String, code: i32 },
    UnknownStartVersion { version: String },
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed { .. } | RunOutcome::AlreadyLatest { .. } => 0,
            RunOutcome::StepFailed { code, .. } => *code,
            RunOutcome::UnknownStartVersion { .. } => STEP_FAILURE_CODE,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code() == 0
    }
}

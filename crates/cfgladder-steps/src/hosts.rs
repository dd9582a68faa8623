use cfgladder_core::{StepContext, UpgradeStep};

/// Runs the wrapped step only on the listed machines; elsewhere the rung
/// succeeds without changes. Host names compare case-insensitively.
pub struct OnlyOnHosts {
    hosts: Vec<String>,
    step: Box<dyn UpgradeStep>,
    hostname: Option<String>,
}

impl OnlyOnHosts {
    pub fn new(hosts: Vec<String>, step: Box<dyn UpgradeStep>) -> Self {
        Self {
            hosts,
            step,
            hostname: None,
        }
    }

    /// Pins the host name instead of asking the operating system.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    fn current_host(&self) -> String {
        match &self.hostname {
            Some(hostname) => hostname.clone(),
            None => gethostname::gethostname().to_string_lossy().to_string(),
        }
    }
}

impl UpgradeStep for OnlyOnHosts {
    fn name(&self) -> &str {
        self.step.name()
    }

    fn perform(&self, ctx: &mut StepContext<'_, '_>) -> i32 {
        let host = self.current_host();
        if self.hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(&host)) {
            return self.step.perform(ctx);
        }
        ctx.logger.info(&format!(
            "Skipping {} on {host}; it only applies to {}",
            self.step.name(),
            self.hosts.join(", ")
        ));
        0
    }
}

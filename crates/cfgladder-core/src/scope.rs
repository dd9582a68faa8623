use anyhow::{Context, Result};

use crate::Logger;

/// A live handle to the shared external resource (a database session).
pub trait Session {
    fn execute(&mut self, statement: &str) -> Result<()>;

    fn execute_batch(&mut self, statements: &[String]) -> Result<()> {
        for statement in statements {
            self.execute(statement)?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()>;
}

/// Establishes sessions. May block on operator input the first time it runs.
pub trait SessionConnector {
    fn connect(&self, logger: &dyn Logger) -> Result<Box<dyn Session>>;
}

/// Run-scoped owner of at most one live session.
///
/// The session is established on first request and reused by every later
/// request in the same run. [`ResourceScope::close`] releases it and empties
/// the slot; dropping an unclosed scope releases it too.
pub struct ResourceScope<'a> {
    connector: Option<&'a dyn SessionConnector>,
    session: Option<Box<dyn Session>>,
}

impl<'a> ResourceScope<'a> {
    pub fn new(connector: &'a dyn SessionConnector) -> Self {
        Self {
            connector: Some(connector),
            session: None,
        }
    }

    /// A scope with nothing to connect to; every session request fails.
    pub fn unavailable() -> Self {
        Self {
            connector: None,
            session: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&mut self, logger: &dyn Logger) -> Result<&mut dyn Session> {
        if self.session.is_none() {
            let Some(connector) = self.connector else {
                anyhow::bail!("session-unavailable: no session connector configured for this run");
            };
            let session = connector
                .connect(logger)
                .context("session-unavailable: failed establishing shared session")?;
            self.session = Some(session);
        }

        match self.session.as_deref_mut() {
            Some(session) => Ok(session),
            None => anyhow::bail!("session-unavailable: shared session slot is empty"),
        }
    }

    pub fn close(&mut self) -> Result<()> {
        match self.session.take() {
            Some(mut session) => session
                .close()
                .context("session-unavailable: failed releasing shared session"),
            None => Ok(()),
        }
    }
}

impl Drop for ResourceScope<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            eprintln!("{err:#}");
        }
    }
}

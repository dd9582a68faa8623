use std::io;
use std::process::{Command, Output};

use anyhow::{Context, Result};
use cfgladder_core::{Logger, Session, SessionConnector};

pub const MYSQL_PASSWORD_ENV: &str = "MYSQL_PASSWORD";

const DEFAULT_CLIENT: &str = "mysql";

/// Connects through the `mysql` command-line client.
///
/// The password comes from `$MYSQL_PASSWORD` when set, otherwise the operator
/// is prompted on the terminal without echo. Each failed attempt is logged;
/// after `max_attempts` the connection fails.
#[derive(Debug, Clone)]
pub struct MysqlCliConnector {
    client: String,
    user: String,
    max_attempts: u32,
}

impl MysqlCliConnector {
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            client: DEFAULT_CLIENT.to_string(),
            user: user.into(),
            max_attempts: 3,
        }
    }

    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = client.into();
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    fn password(&self) -> Result<String> {
        if let Ok(password) = std::env::var(MYSQL_PASSWORD_ENV) {
            return Ok(password);
        }
        prompt_password(&format!("Please enter db {} password: ", self.user))
    }
}

impl SessionConnector for MysqlCliConnector {
    fn connect(&self, logger: &dyn Logger) -> Result<Box<dyn Session>> {
        let mut last_error = None;
        for attempt in 1..=self.max_attempts {
            let attempted = self.password().and_then(|password| {
                let session = MysqlCliSession {
                    client: self.client.clone(),
                    user: self.user.clone(),
                    password: Some(password),
                };
                session.run("SELECT 1;")?;
                Ok(session)
            });
            match attempted {
                Ok(session) => return Ok(Box::new(session)),
                Err(err) => {
                    logger.error(&format!(
                        "Failed to connect to database (attempt {attempt}/{}): {err:#}",
                        self.max_attempts
                    ));
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) => Err(err.context(format!(
                "could not connect to database as '{}' after {} attempt(s)",
                self.user, self.max_attempts
            ))),
            None => anyhow::bail!("could not connect to database as '{}'", self.user),
        }
    }
}

/// Credentials validated against the server; every statement runs in its own
/// client invocation.
#[derive(Debug)]
pub struct MysqlCliSession {
    client: String,
    user: String,
    password: Option<String>,
}

impl MysqlCliSession {
    fn run(&self, sql: &str) -> Result<()> {
        let Some(password) = self.password.as_deref() else {
            anyhow::bail!("database session for '{}' is closed", self.user);
        };
        let output = Command::new(&self.client)
            .arg(format!("--user={}", self.user))
            .arg("--batch")
            .arg("--execute")
            .arg(sql)
            .env("MYSQL_PWD", password)
            .output()
            .with_context(|| format!("failed launching {}", self.client))?;
        check_client_output(&self.client, &output)
    }
}

impl Session for MysqlCliSession {
    fn execute(&mut self, statement: &str) -> Result<()> {
        self.run(statement)
    }

    fn execute_batch(&mut self, statements: &[String]) -> Result<()> {
        if statements.is_empty() {
            return Ok(());
        }
        self.run(&join_statements(statements))
    }

    fn close(&mut self) -> Result<()> {
        self.password = None;
        Ok(())
    }
}

pub(crate) fn join_statements(statements: &[String]) -> String {
    statements
        .iter()
        .map(|statement| statement.trim())
        .filter(|statement| !statement.is_empty())
        .map(|statement| {
            if statement.ends_with(';') {
                statement.to_string()
            } else {
                format!("{statement};")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn check_client_output(client: &str, output: &Output) -> Result<()> {
    if !output.status.success() {
        anyhow::bail!(
            "{} failed: {}",
            client,
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

fn prompt_password(prompt: &str) -> Result<String> {
    password_from_prompt(rpassword::prompt_password(prompt))
}

/// Maps the prompt result; a closed input stream means nobody can answer.
pub(crate) fn password_from_prompt(prompted: io::Result<String>) -> Result<String> {
    match prompted {
        Ok(password) => Ok(password),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
            anyhow::bail!(
                "no password available: stdin is closed and {MYSQL_PASSWORD_ENV} is unset"
            )
        }
        Err(err) => Err(anyhow::Error::new(err).context("failed reading password")),
    }
}

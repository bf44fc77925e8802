/// Executor module - runs statements against the engine
///
/// Structure:
/// - retry: bounded fixed-backoff policy
/// - materialize: paging cursors into `QueryResult`
/// - script: `.sql` files and folders of files

pub mod retry;
pub mod materialize;
pub mod script;

pub use retry::RetryPolicy;
pub use materialize::RowMaterializer;
pub use script::{execute_file, execute_folder, read_statements};

use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::timing::preview;
use crate::core::{Clock, HelperConfig, QueryResult, Result};
use crate::session::{ConnectionManager, Cursor};

/// Executes single statements with retry on top of a [`ConnectionManager`].
pub struct QueryExecutor {
    connections: ConnectionManager,
    policy: RetryPolicy,
    materializer: RowMaterializer,
    clock: Arc<dyn Clock>,
    info_length: usize,
}

impl QueryExecutor {
    pub fn new(connections: ConnectionManager, config: &HelperConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            connections,
            policy: RetryPolicy::from_config(config),
            materializer: RowMaterializer::new(config.fetch_size),
            clock,
            info_length: config.info_length,
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    #[must_use]
    pub const fn connections(&self) -> &ConnectionManager {
        &self.connections
    }

    pub fn connections_mut(&mut self) -> &mut ConnectionManager {
        &mut self.connections
    }

    /// Executes `statement`, retrying transient failures.
    ///
    /// Session faults also invalidate the session so the next attempt runs
    /// on a fresh one. The last error surfaces once the attempts run out.
    pub fn execute(&mut self, statement: &str) -> Result<Box<dyn Cursor>> {
        let shown = preview(statement, self.info_length);
        debug!(statement = %shown, "executing");

        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = self
                .connections
                .acquire()
                .and_then(|session| session.execute(statement));
            match outcome {
                Ok(cursor) => return Ok(cursor),
                Err(e) if self.policy.should_retry(attempts, &e) => {
                    warn!(
                        attempt = attempts,
                        max_attempts = self.policy.max_attempts(),
                        error = %e,
                        statement = %shown,
                        "statement failed, retrying"
                    );
                    if e.is_session_fault() {
                        self.connections.invalidate();
                    }
                    self.clock.sleep(self.policy.wait);
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Executes a statement whose rows, if any, are not needed.
    pub fn run(&mut self, statement: &str) -> Result<()> {
        self.execute(statement).map(|_| ())
    }

    pub fn run_all<S: AsRef<str>>(&mut self, statements: &[S]) -> Result<()> {
        for statement in statements {
            self.run(statement.as_ref())?;
        }
        Ok(())
    }

    /// Executes and materializes the whole result in memory.
    pub fn query(&mut self, statement: &str) -> Result<QueryResult> {
        let mut cursor = self.execute(statement)?;
        self.materializer.materialize(cursor.as_mut())
    }

    pub fn close(&mut self) {
        self.connections.close();
    }
}

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::engine::{Cursor, EngineConnection, EngineConnector};
use crate::core::{Clock, HelperConfig, HelperError, Result};
use crate::params;
use crate::sql::TemplateCatalog;

/// One live engine session.
pub struct Session {
    id: u64,
    connection: Box<dyn EngineConnection>,
    namespace: Option<String>,
    refreshed_at: Instant,
}

impl Session {
    /// Generation number; a refresh always yields a new id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[must_use]
    pub const fn refreshed_at(&self) -> Instant {
        self.refreshed_at
    }

    pub fn execute(&mut self, statement: &str) -> Result<Box<dyn Cursor>> {
        self.connection.execute(statement)
    }
}

/// Owns the single logical session of a helper and refreshes it lazily.
pub struct ConnectionManager {
    connector: Box<dyn EngineConnector>,
    connection_string: String,
    refresh_interval: Duration,
    apply_session_options: bool,
    namespace: Option<String>,
    catalog: Arc<TemplateCatalog>,
    clock: Arc<dyn Clock>,
    session: Option<Session>,
    generation: u64,
}

impl ConnectionManager {
    pub fn new(
        connector: Box<dyn EngineConnector>,
        config: &HelperConfig,
        catalog: Arc<TemplateCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            connector,
            connection_string: config.connection_string.clone(),
            refresh_interval: config.refresh_interval(),
            apply_session_options: config.session_options,
            namespace: config.database.clone(),
            catalog,
            clock,
            session: None,
            generation: 0,
        }
    }

    /// Namespace re-applied on every new session.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    #[must_use]
    pub fn session_id(&self) -> Option<u64> {
        self.session.as_ref().map(Session::id)
    }

    /// Returns the live session, replacing it first when there is none or
    /// it is older than the refresh interval.
    pub fn acquire(&mut self) -> Result<&mut Session> {
        let stale = match &self.session {
            None => true,
            Some(session) => {
                let elapsed = self.clock.now().saturating_duration_since(session.refreshed_at);
                if elapsed > self.refresh_interval {
                    info!(
                        elapsed_secs = elapsed.as_secs(),
                        refresh_secs = self.refresh_interval.as_secs(),
                        "refreshing session"
                    );
                    true
                } else {
                    false
                }
            }
        };
        if stale {
            self.reconnect()?;
        }
        self.session
            .as_mut()
            .ok_or_else(|| HelperError::Connection("no session available".into()))
    }

    fn reconnect(&mut self) -> Result<()> {
        self.teardown();
        let connection = self.connector.connect(&self.connection_string)?;
        self.generation += 1;
        let mut session = Session {
            id: self.generation,
            connection,
            namespace: None,
            refreshed_at: self.clock.now(),
        };

        if let Err(e) = self.initialize(&mut session) {
            if let Err(close_err) = session.connection.close() {
                warn!(error = %close_err, "failed to close half-initialized session");
            }
            return Err(e);
        }
        info!(session = session.id, namespace = ?session.namespace, "session opened");
        self.session = Some(session);
        Ok(())
    }

    fn initialize(&self, session: &mut Session) -> Result<()> {
        if let Some(namespace) = &self.namespace {
            let statement = self.catalog.render("use_database", &params! { "database" => namespace })?;
            session.execute(&statement)?;
            session.namespace = Some(namespace.clone());
        }
        if self.apply_session_options {
            for statement in self.catalog.statements("session_options", &params! {})? {
                debug!(statement = %statement, "applying session option");
                session.execute(&statement)?;
            }
        }
        Ok(())
    }

    /// Switches the default namespace now and for every later session.
    pub fn set_namespace(&mut self, name: &str) -> Result<()> {
        let statement = self.catalog.render("use_database", &params! { "database" => name })?;
        let session = self.acquire()?;
        session.execute(&statement)?;
        session.namespace = Some(name.to_string());
        self.namespace = Some(name.to_string());
        info!(namespace = name, "namespace changed");
        Ok(())
    }

    /// Drops the current session; the next `acquire` opens a fresh one.
    pub fn invalidate(&mut self) {
        if self.session.is_some() {
            warn!(session = ?self.session_id(), "invalidating session");
        }
        self.teardown();
    }

    pub fn close(&mut self) {
        if let Some(id) = self.session_id() {
            self.teardown();
            info!(session = id, "session closed");
        }
    }

    fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.connection.close() {
                warn!(session = session.id, error = %e, "failed to close session");
            }
        }
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::engine::VecCursor;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Log {
        connects: usize,
        closes: usize,
        statements: Vec<String>,
    }

    struct FakeConnector {
        log: Arc<Mutex<Log>>,
        fail_connect: bool,
    }

    struct FakeConnection {
        log: Arc<Mutex<Log>>,
    }

    impl EngineConnector for FakeConnector {
        fn connect(&self, _connection_string: &str) -> Result<Box<dyn EngineConnection>> {
            if self.fail_connect {
                return Err(HelperError::Connection("refused".into()));
            }
            self.log.lock().unwrap().connects += 1;
            Ok(Box::new(FakeConnection { log: Arc::clone(&self.log) }))
        }
    }

    impl EngineConnection for FakeConnection {
        fn execute(&mut self, statement: &str) -> Result<Box<dyn Cursor>> {
            self.log.lock().unwrap().statements.push(statement.to_string());
            Ok(Box::new(VecCursor::empty()))
        }

        fn close(&mut self) -> Result<()> {
            self.log.lock().unwrap().closes += 1;
            Ok(())
        }
    }

    struct ManualClock(Mutex<Instant>);

    impl ManualClock {
        fn advance(&self, by: Duration) {
            let mut now = self.0.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.0.lock().unwrap()
        }

        fn sleep(&self, duration: Duration) {
            self.advance(duration);
        }
    }

    fn manager(config: &HelperConfig) -> (ConnectionManager, Arc<Mutex<Log>>, Arc<ManualClock>) {
        let log = Arc::new(Mutex::new(Log::default()));
        let clock = Arc::new(ManualClock(Mutex::new(Instant::now())));
        let connector = FakeConnector { log: Arc::clone(&log), fail_connect: false };
        let catalog = Arc::new(TemplateCatalog::builtin().unwrap());
        let clock_dyn: Arc<dyn Clock> = clock.clone();
        (ConnectionManager::new(Box::new(connector), config, catalog, clock_dyn), log, clock)
    }

    #[test]
    fn test_session_reused_within_interval() {
        let (mut manager, log, clock) = manager(&HelperConfig::new("host=x"));
        let first = manager.acquire().unwrap().id();
        clock.advance(Duration::from_secs(300));
        assert_eq!(manager.acquire().unwrap().id(), first);
        assert_eq!(log.lock().unwrap().connects, 1);
    }

    #[test]
    fn test_session_refreshed_after_interval() {
        let (mut manager, log, clock) = manager(&HelperConfig::new("host=x"));
        let first = manager.acquire().unwrap().id();
        clock.advance(Duration::from_secs(301));
        assert_ne!(manager.acquire().unwrap().id(), first);
        let log = log.lock().unwrap();
        assert_eq!(log.connects, 2);
        assert_eq!(log.closes, 1);
    }

    #[test]
    fn test_refresh_reapplies_namespace_and_options() {
        let mut config = HelperConfig::new("host=x");
        config.database = Some("proceso".into());
        config.session_options = true;
        let (mut manager, log, _clock) = manager(&config);
        let session = manager.acquire().unwrap();
        assert_eq!(session.namespace(), Some("proceso"));
        let statements = log.lock().unwrap().statements.clone();
        assert_eq!(statements[0], "USE proceso");
        assert!(statements[1].starts_with("SET "));
        assert_eq!(statements.len(), 3);
    }

    #[test]
    fn test_set_namespace_survives_refresh() {
        let (mut manager, log, clock) = manager(&HelperConfig::new("host=x"));
        manager.set_namespace("analytics").unwrap();
        clock.advance(Duration::from_secs(1000));
        manager.acquire().unwrap();
        let statements = log.lock().unwrap().statements.clone();
        assert_eq!(statements, vec!["USE analytics", "USE analytics"]);
    }

    #[test]
    fn test_invalidate_forces_reconnect() {
        let (mut manager, log, _clock) = manager(&HelperConfig::new("host=x"));
        manager.acquire().unwrap();
        manager.invalidate();
        assert!(manager.session_id().is_none());
        assert_eq!(manager.acquire().unwrap().id(), 2);
        assert_eq!(log.lock().unwrap().connects, 2);
    }

    #[test]
    fn test_connect_failure_propagates() {
        let log = Arc::new(Mutex::new(Log::default()));
        let connector = FakeConnector { log, fail_connect: true };
        let mut manager = ConnectionManager::new(
            Box::new(connector),
            &HelperConfig::new("host=x"),
            Arc::new(TemplateCatalog::builtin().unwrap()),
            Arc::new(crate::core::SystemClock),
        );
        assert!(matches!(manager.acquire(), Err(HelperError::Connection(_))));
    }
}

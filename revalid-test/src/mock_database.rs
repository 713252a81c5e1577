//! In-memory database for end-to-end tests.
//!
//! [`MockDatabase`] answers the strategy and probe queries of one backend
//! family from a commit counter and a set of capability toggles, so tests can
//! drive resolution and invalidation without a server.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use http::request::Parts;
use revalid_backend::{Freshness, Strategy};
use revalid_core::{
    BackendError, BackendFamily, CancellationToken, Capability, Command, Connection,
    FreshnessError, FreshnessToken, Row, TokenSupplier,
};

/// Counters for tracking database activity in tests.
#[derive(Debug, Default)]
pub struct DatabaseCounters {
    opens: AtomicUsize,
    closes: AtomicUsize,
    commands: AtomicUsize,
    token_reads: AtomicUsize,
}

impl DatabaseCounters {
    /// Connections opened.
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    /// Connections closed.
    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Commands received, probes included.
    pub fn commands(&self) -> usize {
        self.commands.load(Ordering::SeqCst)
    }

    /// Strategy queries received.
    pub fn token_reads(&self) -> usize {
        self.token_reads.load(Ordering::SeqCst)
    }

    /// Reset all counters to zero.
    pub fn reset(&self) {
        self.opens.store(0, Ordering::SeqCst);
        self.closes.store(0, Ordering::SeqCst);
        self.commands.store(0, Ordering::SeqCst);
        self.token_reads.store(0, Ordering::SeqCst);
    }
}

enum Answer {
    Scalar(Option<String>),
    Rows(Vec<Row>),
}

/// A shared in-memory database of one [`BackendFamily`].
///
/// Clones share state. Capabilities start disabled, so resolution falls back
/// to the family's commit counter until a test enables one.
#[derive(Clone)]
pub struct MockDatabase {
    family: BackendFamily,
    capabilities: Arc<DashMap<Capability, bool>>,
    denied: Arc<DashSet<Strategy>>,
    commits: Arc<AtomicU64>,
    offline: Arc<AtomicBool>,
    counters: Arc<DatabaseCounters>,
}

impl MockDatabase {
    /// Creates an empty database of `family`.
    pub fn new(family: BackendFamily) -> Self {
        Self {
            family,
            capabilities: Arc::new(DashMap::new()),
            denied: Arc::new(DashSet::new()),
            commits: Arc::new(AtomicU64::new(0)),
            offline: Arc::new(AtomicBool::new(false)),
            counters: Arc::new(DatabaseCounters::default()),
        }
    }

    /// A SQL Server database.
    pub fn sql_server() -> Self {
        Self::new(BackendFamily::SqlServer)
    }

    /// A PostgreSQL database.
    pub fn postgres() -> Self {
        Self::new(BackendFamily::Postgres)
    }

    /// A MySQL database.
    pub fn mysql() -> Self {
        Self::new(BackendFamily::MySql)
    }

    /// Enables `capability` and returns the database.
    pub fn with(self, capability: Capability) -> Self {
        self.set_capability(capability, true);
        self
    }

    /// Switches `capability` on or off.
    pub fn set_capability(&self, capability: Capability, present: bool) {
        self.capabilities.insert(capability, present);
    }

    /// Makes the query of `strategy` fail with a permission error while its
    /// capability probe keeps succeeding.
    pub fn deny(&self, strategy: Strategy) {
        self.denied.insert(strategy);
    }

    /// Refuses new connections while `offline` is set.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Commits one write.
    pub fn write(&self) {
        self.commits.fetch_add(1, Ordering::SeqCst);
    }

    /// Writes committed so far.
    pub fn commits(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// The family this database reports.
    pub fn family(&self) -> &BackendFamily {
        &self.family
    }

    /// Activity counters.
    pub fn counters(&self) -> &DatabaseCounters {
        &self.counters
    }

    /// A closed connection to this database.
    pub fn connect(&self) -> MockConnection {
        MockConnection {
            database: self.clone(),
            open: false,
        }
    }

    /// A supplier reading through a fresh connection per request, with its
    /// own strategy cache.
    pub fn supplier(&self) -> MockSupplier {
        MockSupplier::new(self.clone(), Freshness::new())
    }

    fn has(&self, capability: Capability) -> bool {
        self.capabilities
            .get(&capability)
            .is_some_and(|present| *present)
    }

    fn answer(&self, text: &str) -> Result<Answer, BackendError> {
        self.counters.commands.fetch_add(1, Ordering::SeqCst);

        let strategy = Strategy::catalog(&self.family)
            .ok()
            .and_then(|catalog| catalog.iter().find(|s| s.query() == text).copied());
        if let Some(strategy) = strategy {
            self.counters.token_reads.fetch_add(1, Ordering::SeqCst);
            if self.denied.contains(&strategy) {
                return Err(BackendError::PermissionDenied(
                    format!("{} denied", strategy.name()).into(),
                ));
            }
            return Ok(self.read(strategy));
        }

        let flag = |present: bool, yes: &str, no: &str| {
            Answer::Scalar(Some(if present { yes } else { no }.to_owned()))
        };
        match self.family {
            BackendFamily::SqlServer if text.contains("VIEW SERVER STATE") => {
                Ok(flag(self.has(Capability::ServerStatePermission), "1", "0"))
            }
            BackendFamily::SqlServer if text.contains("change_tracking_databases") => {
                Ok(flag(self.has(Capability::ChangeTracking), "1", "0"))
            }
            BackendFamily::Postgres if text.contains("track_commit_timestamp") => {
                Ok(flag(self.has(Capability::CommitTimestamps), "on", "off"))
            }
            _ => Err(BackendError::InternalError(
                format!("{} cannot run: {}", self.family, text.trim()).into(),
            )),
        }
    }

    fn read(&self, strategy: Strategy) -> Answer {
        let commits = self.commits();
        let value = |value: u64| Answer::Scalar(Some(value.to_string()));
        match strategy {
            Strategy::SqlServerLogSequence if commits == 0 => Answer::Rows(Vec::new()),
            Strategy::SqlServerLogSequence => Answer::Rows(vec![Row::new(vec![Some(format!(
                "2026/10/19 08:00:{:02}:{:03}",
                commits / 1000,
                commits % 1000
            ))])]),
            Strategy::SqlServerRowVersion if self.has(Capability::ChangeTracking) => {
                Answer::Scalar(Some(format!("{}-{}", 2000 + commits, commits)))
            }
            Strategy::SqlServerRowVersion | Strategy::SqlServerCommitCounter => {
                value(2000 + commits)
            }
            Strategy::PostgresCommittedXact if commits == 0 => Answer::Scalar(None),
            Strategy::PostgresCommittedXact => value(740 + commits),
            Strategy::PostgresCommitCounter => {
                let xmax = 741 + commits;
                Answer::Scalar(Some(format!("{xmax}:{xmax}:")))
            }
            Strategy::MySqlReplicationPosition if self.has(Capability::BinaryLog) => {
                Answer::Rows(vec![Row::new(vec![
                    Some("binlog.000001".to_owned()),
                    Some((157 + commits * 311).to_string()),
                ])])
            }
            Strategy::MySqlReplicationPosition => Answer::Rows(Vec::new()),
            Strategy::MySqlCommitCounter => value(commits),
        }
    }
}

/// Transaction marker for [`MockConnection`].
#[derive(Debug, Default)]
pub struct MockTransaction;

/// A connection to a [`MockDatabase`].
pub struct MockConnection {
    database: MockDatabase,
    open: bool,
}

impl MockConnection {
    fn check_open(&self) -> Result<(), BackendError> {
        if self.open {
            Ok(())
        } else {
            Err(BackendError::ConnectionError(
                "connection is not open".into(),
            ))
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    type Transaction = MockTransaction;

    fn family(&self) -> BackendFamily {
        self.database.family.clone()
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self) -> Result<(), BackendError> {
        if self.database.offline.load(Ordering::SeqCst) {
            return Err(BackendError::ConnectionError(
                "database is offline".into(),
            ));
        }
        self.database.counters.opens.fetch_add(1, Ordering::SeqCst);
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        if self.open {
            self.database.counters.closes.fetch_add(1, Ordering::SeqCst);
            self.open = false;
        }
        Ok(())
    }

    async fn execute_scalar(
        &mut self,
        command: Command<'_, Self::Transaction>,
    ) -> Result<Option<String>, BackendError> {
        self.check_open()?;
        Ok(match self.database.answer(command.text)? {
            Answer::Scalar(value) => value,
            Answer::Rows(rows) => rows
                .first()
                .and_then(|row| row.get(0))
                .map(str::to_owned),
        })
    }

    async fn execute_reader(
        &mut self,
        command: Command<'_, Self::Transaction>,
    ) -> Result<Vec<Row>, BackendError> {
        self.check_open()?;
        Ok(match self.database.answer(command.text)? {
            Answer::Scalar(value) => vec![Row::new(vec![value])],
            Answer::Rows(rows) => rows,
        })
    }

    async fn execute_non_query(
        &mut self,
        command: Command<'_, Self::Transaction>,
    ) -> Result<u64, BackendError> {
        self.check_open()?;
        self.database.answer(command.text).map(|_| 0)
    }
}

/// [`TokenSupplier`] over a [`MockDatabase`], counting its calls.
pub struct MockSupplier {
    database: MockDatabase,
    freshness: Freshness,
    calls: AtomicUsize,
}

impl MockSupplier {
    /// Creates a supplier reading through `freshness`.
    pub fn new(database: MockDatabase, freshness: Freshness) -> Self {
        Self {
            database,
            freshness,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of tokens requested.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The facade tokens are read through.
    pub fn freshness(&self) -> &Freshness {
        &self.freshness
    }

    /// The database behind this supplier.
    pub fn database(&self) -> &MockDatabase {
        &self.database
    }
}

#[async_trait]
impl TokenSupplier for MockSupplier {
    async fn token(
        &self,
        _request: &Parts,
        cancel: &CancellationToken,
    ) -> Result<FreshnessToken, FreshnessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut conn = self.database.connect();
        self.freshness.token(&mut conn, None, cancel).await
    }
}

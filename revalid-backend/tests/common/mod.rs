//! Scripted connection for strategy tests.
//!
//! Replies are matched by a substring of the command text; the first
//! matching script entry wins. Every command, open and close is recorded.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use revalid_core::{BackendError, BackendFamily, Command, Connection, Row};

#[derive(Debug, Clone)]
pub enum Reply {
    Scalar(Option<String>),
    Rows(Vec<Row>),
    Denied,
    Fail,
    Dropped,
    Hang,
}

impl Reply {
    pub fn scalar(value: &str) -> Self {
        Reply::Scalar(Some(value.to_owned()))
    }

    pub fn row(columns: &[&str]) -> Self {
        Reply::Rows(vec![columns.iter().map(|c| Some(*c)).collect()])
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub commands: AtomicUsize,
    pub in_transaction: AtomicUsize,
}

impl Counters {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn commands(&self) -> usize {
        self.commands.load(Ordering::SeqCst)
    }

    pub fn in_transaction(&self) -> usize {
        self.in_transaction.load(Ordering::SeqCst)
    }
}

/// Marker transaction handle.
#[derive(Debug)]
pub struct ScriptedTransaction;

#[derive(Clone)]
pub struct ScriptedConnection {
    family: BackendFamily,
    open: bool,
    script: Arc<Vec<(&'static str, Reply)>>,
    pub log: Arc<DashMap<usize, String>>,
    pub counters: Arc<Counters>,
}

impl ScriptedConnection {
    pub fn new(family: BackendFamily, script: Vec<(&'static str, Reply)>) -> Self {
        Self {
            family,
            open: false,
            script: Arc::new(script),
            log: Arc::new(DashMap::new()),
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn opened(mut self) -> Self {
        self.open = true;
        self
    }

    pub fn executed(&self, needle: &str) -> usize {
        self.log
            .iter()
            .filter(|entry| entry.value().contains(needle))
            .count()
    }

    async fn reply(
        &mut self,
        command: Command<'_, ScriptedTransaction>,
    ) -> Result<Reply, BackendError> {
        assert!(self.open, "command sent on a closed connection");
        let index = self.counters.commands.fetch_add(1, Ordering::SeqCst);
        self.log.insert(index, command.text.to_owned());
        if command.transaction.is_some() {
            self.counters.in_transaction.fetch_add(1, Ordering::SeqCst);
        }

        let reply = self
            .script
            .iter()
            .find(|(needle, _)| command.text.contains(needle))
            .map(|(_, reply)| reply.clone())
            .unwrap_or_else(|| panic!("unscripted command: {}", command.text));

        match reply {
            Reply::Denied => Err(BackendError::PermissionDenied("permission denied".into())),
            Reply::Fail => Err(BackendError::InternalError("boom".into())),
            Reply::Dropped => Err(BackendError::ConnectionError("connection reset".into())),
            Reply::Hang => std::future::pending().await,
            other => Ok(other),
        }
    }
}

#[async_trait]
impl Connection for ScriptedConnection {
    type Transaction = ScriptedTransaction;

    fn family(&self) -> BackendFamily {
        self.family.clone()
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn open(&mut self) -> Result<(), BackendError> {
        self.counters.opens.fetch_add(1, Ordering::SeqCst);
        self.open = true;
        Ok(())
    }

    async fn close(&mut self) -> Result<(), BackendError> {
        self.counters.closes.fetch_add(1, Ordering::SeqCst);
        self.open = false;
        Ok(())
    }

    async fn execute_scalar(
        &mut self,
        command: Command<'_, Self::Transaction>,
    ) -> Result<Option<String>, BackendError> {
        match self.reply(command).await? {
            Reply::Scalar(value) => Ok(value),
            Reply::Rows(rows) => Ok(rows.first().and_then(|r| r.get(0)).map(str::to_owned)),
            _ => unreachable!(),
        }
    }

    async fn execute_reader(
        &mut self,
        command: Command<'_, Self::Transaction>,
    ) -> Result<Vec<Row>, BackendError> {
        match self.reply(command).await? {
            Reply::Scalar(value) => Ok(vec![Row::new(vec![value])]),
            Reply::Rows(rows) => Ok(rows),
            _ => unreachable!(),
        }
    }

    async fn execute_non_query(
        &mut self,
        command: Command<'_, Self::Transaction>,
    ) -> Result<u64, BackendError> {
        self.reply(command).await.map(|_| 0)
    }
}

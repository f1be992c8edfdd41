//! Scripted directory for tests.
//!
//! Accounts and entries are fixed up front; counters record how the
//! authenticator used its connections so tests can assert that every
//! connection was released.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::client::{DirectoryConnection, DirectoryConnector, DirectoryEntry};
use crate::config::DirectoryConfig;
use crate::error::{DirectoryError, Result};

/// How binds behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BindPlan {
    /// Check the principal and password against the known accounts.
    #[default]
    Verify,
    /// Never answer.
    Hang,
    /// Answer with a transient "unavailable" error.
    Fail,
}

#[derive(Debug, Clone, Default)]
struct Script {
    accounts: HashMap<String, String>,
    entries: HashMap<String, DirectoryEntry>,
    bind_plan: BindPlan,
    failing_connects: usize,
    hanging_search: bool,
}

#[derive(Debug, Default)]
struct Counters {
    connects: AtomicUsize,
    opened: AtomicUsize,
    binds: AtomicUsize,
    searches: AtomicUsize,
    releases: AtomicUsize,
}

#[derive(Debug, Clone, Default)]
pub struct ScriptedConnector {
    script: Arc<Script>,
    counters: Arc<Counters>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, principal: &str, password: &str) -> Self {
        Arc::make_mut(&mut self.script)
            .accounts
            .insert(principal.to_string(), password.to_string());
        self
    }

    /// Entry returned when searching for `username`.
    pub fn with_entry(mut self, username: &str, entry: DirectoryEntry) -> Self {
        Arc::make_mut(&mut self.script)
            .entries
            .insert(username.to_string(), entry);
        self
    }

    pub fn with_bind_plan(mut self, plan: BindPlan) -> Self {
        Arc::make_mut(&mut self.script).bind_plan = plan;
        self
    }

    /// The first `count` connection attempts are refused.
    pub fn with_failing_connects(mut self, count: usize) -> Self {
        Arc::make_mut(&mut self.script).failing_connects = count;
        self
    }

    pub fn with_hanging_search(mut self) -> Self {
        Arc::make_mut(&mut self.script).hanging_search = true;
        self
    }

    pub fn connects(&self) -> usize {
        self.counters.connects.load(Ordering::SeqCst)
    }

    pub fn binds(&self) -> usize {
        self.counters.binds.load(Ordering::SeqCst)
    }

    pub fn searches(&self) -> usize {
        self.counters.searches.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.counters.releases.load(Ordering::SeqCst)
    }

    /// Connections opened and not yet released.
    pub fn open_connections(&self) -> usize {
        self.counters
            .opened
            .load(Ordering::SeqCst)
            .saturating_sub(self.releases())
    }
}

#[async_trait]
impl DirectoryConnector for ScriptedConnector {
    async fn connect(&self, config: &DirectoryConfig) -> Result<Box<dyn DirectoryConnection>> {
        let attempt = self.counters.connects.fetch_add(1, Ordering::SeqCst);
        if attempt < self.script.failing_connects {
            return Err(DirectoryError::Connect(format!("{}: connection refused", config.url)));
        }

        self.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedConnection {
            script: self.script.clone(),
            counters: self.counters.clone(),
            released: false,
        }))
    }
}

struct ScriptedConnection {
    script: Arc<Script>,
    counters: Arc<Counters>,
    released: bool,
}

#[async_trait]
impl DirectoryConnection for ScriptedConnection {
    async fn bind(&mut self, principal: &str, password: &str) -> Result<()> {
        self.counters.binds.fetch_add(1, Ordering::SeqCst);
        match self.script.bind_plan {
            BindPlan::Verify => match self.script.accounts.get(principal) {
                Some(expected) if expected == password => Ok(()),
                _ => Err(DirectoryError::InvalidCredentials),
            },
            BindPlan::Hang => std::future::pending().await,
            BindPlan::Fail => Err(DirectoryError::Unavailable("scripted failure".to_string())),
        }
    }

    async fn search(&mut self, _base: &str, filter: &str, _attributes: &[&str]) -> Result<Vec<DirectoryEntry>> {
        self.counters.searches.fetch_add(1, Ordering::SeqCst);
        if self.script.hanging_search {
            std::future::pending::<()>().await;
        }

        let username = filter
            .split_once('=')
            .map(|(_, rest)| rest.trim_end_matches(')'))
            .unwrap_or_default();
        Ok(self.script.entries.get(username).cloned().into_iter().collect())
    }

    async fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.counters.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

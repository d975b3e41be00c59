//! In-process remote store.

use super::RemoteStore;
use crate::pattern::GlobPattern;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use strata_core::{StrataError, StrataResult};
use tokio::time::Instant;

#[derive(Debug, Clone)]
enum StoredValue {
    Text(String),
    Set(HashSet<String>),
}

#[derive(Debug, Clone)]
struct StoredEntry {
    value: StoredValue,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| now < at)
    }
}

/// [`RemoteStore`] kept in a process-local map.
///
/// Used when no Redis server is configured and as the backing store in
/// tests. Expiry follows tokio's clock, so paused-time tests can advance
/// it. [`set_failing`](MemoryStore::set_failing) makes every command fail
/// with a transport error to simulate an outage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, StoredEntry>>,
    failing: AtomicBool,
    calls: AtomicU64,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggles simulated outage mode.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of commands received, including failed ones.
    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.data.lock().values().filter(|e| e.is_live(now)).count()
    }

    /// Returns true if no live keys are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remaining lifetime of any live key, including sets. `None` if the
    /// key is missing or persistent.
    pub fn remaining_ttl(&self, key: &str) -> Option<Duration> {
        let now = Instant::now();
        self.data
            .lock()
            .get(key)
            .filter(|entry| entry.is_live(now))
            .and_then(|entry| entry.expires_at)
            .map(|at| at - now)
    }

    /// Writes a raw value directly, bypassing the cache.
    pub fn insert_raw(&self, key: &str, value: &str, ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.data.lock().insert(
            key.to_string(),
            StoredEntry {
                value: StoredValue::Text(value.to_string()),
                expires_at,
            },
        );
    }

    fn enter(&self, op: &str) -> StrataResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StrataError::transport(format!("{} failed: connection refused", op)));
        }
        Ok(())
    }

    fn read_text(data: &mut HashMap<String, StoredEntry>, key: &str, now: Instant) -> Option<String> {
        let live = data.get(key).map(|entry| entry.is_live(now));
        if live == Some(false) {
            data.remove(key);
            return None;
        }

        match data.get(key) {
            Some(StoredEntry {
                value: StoredValue::Text(text),
                ..
            }) => Some(text.clone()),
            _ => None,
        }
    }

    fn write_text(data: &mut HashMap<String, StoredEntry>, key: &str, value: &str, ttl: Duration) {
        data.insert(
            key.to_string(),
            StoredEntry {
                value: StoredValue::Text(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, key: &str) -> StrataResult<Option<String>> {
        self.enter("GET")?;
        let now = Instant::now();
        Ok(Self::read_text(&mut self.data.lock(), key, now))
    }

    async fn get_with_ttl(&self, key: &str) -> StrataResult<Option<(String, Option<Duration>)>> {
        self.enter("GET+PTTL")?;
        let now = Instant::now();
        let mut data = self.data.lock();
        let Some(value) = Self::read_text(&mut data, key, now) else {
            return Ok(None);
        };
        let remaining = data
            .get(key)
            .and_then(|entry| entry.expires_at)
            .map(|at| at - now);
        Ok(Some((value, remaining)))
    }

    async fn mget(&self, keys: &[String]) -> StrataResult<Vec<Option<String>>> {
        self.enter("MGET")?;
        let now = Instant::now();
        let mut data = self.data.lock();
        Ok(keys
            .iter()
            .map(|key| Self::read_text(&mut data, key, now))
            .collect())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StrataResult<()> {
        self.enter("SET")?;
        Self::write_text(&mut self.data.lock(), key, value, ttl);
        Ok(())
    }

    async fn mset_ex(&self, entries: &[(String, String)], ttl: Duration) -> StrataResult<()> {
        self.enter("PIPELINE")?;
        let mut data = self.data.lock();
        for (key, value) in entries {
            Self::write_text(&mut data, key, value, ttl);
        }
        Ok(())
    }

    async fn del(&self, keys: &[String]) -> StrataResult<u64> {
        self.enter("DEL")?;
        let now = Instant::now();
        let mut data = self.data.lock();
        let mut deleted = 0;
        for key in keys {
            if let Some(entry) = data.remove(key) {
                if entry.is_live(now) {
                    deleted += 1;
                }
            }
        }
        Ok(deleted)
    }

    async fn keys(&self, pattern: &str) -> StrataResult<Vec<String>> {
        self.enter("KEYS")?;
        let glob = GlobPattern::new(pattern)?;
        let now = Instant::now();
        Ok(self
            .data
            .lock()
            .iter()
            .filter(|(key, entry)| entry.is_live(now) && glob.matches(key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn sadd(&self, key: &str, member: &str) -> StrataResult<()> {
        self.enter("SADD")?;
        let now = Instant::now();
        let mut data = self.data.lock();

        let entry = data
            .entry(key.to_string())
            .or_insert_with(|| StoredEntry {
                value: StoredValue::Set(HashSet::new()),
                expires_at: None,
            });
        if !entry.is_live(now) {
            *entry = StoredEntry {
                value: StoredValue::Set(HashSet::new()),
                expires_at: None,
            };
        }

        match &mut entry.value {
            StoredValue::Set(members) => {
                members.insert(member.to_string());
                Ok(())
            }
            StoredValue::Text(_) => Err(StrataError::Cache(
                "WRONGTYPE Operation against a key holding the wrong kind of value".to_string(),
            )),
        }
    }

    async fn smembers(&self, key: &str) -> StrataResult<Vec<String>> {
        self.enter("SMEMBERS")?;
        let now = Instant::now();
        let data = self.data.lock();
        match data.get(key) {
            Some(StoredEntry {
                value: StoredValue::Set(members),
                expires_at,
            }) if expires_at.map_or(true, |at| now < at) => Ok(members.iter().cloned().collect()),
            _ => Ok(Vec::new()),
        }
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StrataResult<()> {
        self.enter("EXPIRE")?;
        if let Some(entry) = self.data.lock().get_mut(key) {
            entry.expires_at = Some(Instant::now() + ttl);
        }
        Ok(())
    }

    async fn ping(&self) -> StrataResult<()> {
        self.enter("PING")
    }

    async fn flush_db(&self) -> StrataResult<()> {
        self.enter("FLUSHDB")?;
        self.data.lock().clear();
        Ok(())
    }
}

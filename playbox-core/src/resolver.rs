//! Archive resolution with a shared cache.
//!
//! `resolve` returns a cached archive or fetches, parses and registers one.
//! Concurrent requests for the same path share one in-flight fetch: the first
//! caller creates a flight cell, later callers block on that cell and receive
//! the same result. Unrelated paths never wait on each other, and a failed
//! flight is dropped so that the next request fetches again.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::archive::Archive;
use crate::error::{ArchiveFormatError, CoreError, DependencyError, ResolveError};
use crate::frontend::Importer;
use crate::store::ArchiveStore;
use crate::transport::Transport;

type Flight = Arc<OnceCell<Result<Arc<Archive>, ResolveError>>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResolverStats {
    /// Requests answered from the store.
    pub hits: u64,
    /// Transport fetches performed.
    pub fetches: u64,
    /// Flights that ended in an error.
    pub failures: u64,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    fetches: AtomicU64,
    failures: AtomicU64,
}

pub struct ArchiveResolver {
    store: Arc<ArchiveStore>,
    transport: Arc<dyn Transport>,
    in_flight: Mutex<HashMap<String, Flight>>,
    counters: Counters,
}

impl ArchiveResolver {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_store(Arc::new(ArchiveStore::new()), transport)
    }

    pub fn with_store(store: Arc<ArchiveStore>, transport: Arc<dyn Transport>) -> Self {
        Self {
            store,
            transport,
            in_flight: Mutex::new(HashMap::new()),
            counters: Counters::default(),
        }
    }

    pub fn store(&self) -> &Arc<ArchiveStore> {
        &self.store
    }

    pub fn stats(&self) -> ResolverStats {
        ResolverStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            fetches: self.counters.fetches.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Seeds the store with archives that need no fetch.
    pub fn preload(&self, archives: impl IntoIterator<Item = Archive>) -> Result<usize, CoreError> {
        let mut loaded = 0;
        for archive in archives {
            let import_path = archive.import_path.clone();
            self.store.insert(archive)?;
            debug!(%import_path, "preloaded archive");
            loaded += 1;
        }
        Ok(loaded)
    }

    pub fn resolve(&self, import_path: &str) -> Result<Arc<Archive>, ResolveError> {
        if let Some(archive) = self.store.get(import_path) {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(import_path, "archive cache hit");
            return Ok(archive);
        }

        let (flight, owner) = {
            let mut in_flight = self.in_flight.lock();
            // A flight may have completed between the lookup above and
            // taking the lock; its archive is in the store by now.
            if let Some(archive) = self.store.get(import_path) {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(archive);
            }
            match in_flight.get(import_path) {
                Some(flight) => (flight.clone(), false),
                None => {
                    let flight: Flight = Arc::new(OnceCell::new());
                    in_flight.insert(import_path.to_string(), flight.clone());
                    (flight, true)
                }
            }
        };

        if !owner {
            debug!(import_path, "joining in-flight archive fetch");
        }
        let result = flight
            .get_or_init(|| self.fetch_and_register(import_path))
            .clone();
        if owner {
            self.in_flight.lock().remove(import_path);
        }
        result
    }

    fn fetch_and_register(&self, import_path: &str) -> Result<Arc<Archive>, ResolveError> {
        self.counters.fetches.fetch_add(1, Ordering::Relaxed);
        debug!(import_path, "fetching archive");

        let result = self
            .transport
            .fetch(import_path)
            .map_err(ResolveError::from)
            .and_then(|bytes| Archive::read(import_path, &bytes).map_err(ResolveError::from))
            .and_then(|archive| self.store.insert(archive).map_err(ResolveError::from));

        match &result {
            Ok(archive) => info!(
                import_path,
                imports = archive.imports.len(),
                exports = archive.exports.len(),
                "archive registered"
            ),
            Err(error) => {
                self.counters.failures.fetch_add(1, Ordering::Relaxed);
                warn!(import_path, %error, "archive resolution failed");
            }
        }
        result
    }

    /// Resolves every package reachable from `entry`, dependencies first.
    ///
    /// The entry itself is not part of the result. A failure anywhere aborts
    /// the walk; the error's chain leads from the entry to the failing path.
    pub fn resolve_closure(&self, entry: &Archive) -> Result<Vec<Arc<Archive>>, DependencyError> {
        let mut walk = Walk {
            visited: HashSet::new(),
            order: Vec::new(),
            stack: vec![entry.import_path.clone()],
        };
        for import in &entry.imports {
            self.visit(import, &mut walk)?;
        }
        Ok(walk.order)
    }

    fn visit(&self, import_path: &str, walk: &mut Walk) -> Result<(), DependencyError> {
        if walk.visited.contains(import_path) {
            return Ok(());
        }
        if walk.stack.iter().any(|path| path == import_path) {
            let mut chain = walk.stack.clone();
            chain.push(import_path.to_string());
            let reason = format!("import cycle {}", chain.join(" -> "));
            return Err(DependencyError {
                chain,
                cause: ArchiveFormatError::new(import_path, reason).into(),
            });
        }

        walk.stack.push(import_path.to_string());
        let archive = self.resolve(import_path).map_err(|cause| DependencyError {
            chain: walk.stack.clone(),
            cause,
        })?;
        for import in &archive.imports {
            self.visit(import, walk)?;
        }
        walk.stack.pop();
        walk.visited.insert(import_path.to_string());
        walk.order.push(archive);
        Ok(())
    }
}

struct Walk {
    visited: HashSet<String>,
    order: Vec<Arc<Archive>>,
    stack: Vec<String>,
}

impl Importer for ArchiveResolver {
    fn import(&self, import_path: &str) -> Result<Arc<Archive>, ResolveError> {
        self.resolve(import_path)
    }
}

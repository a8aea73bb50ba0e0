// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Ownership of in-flight work.
//
// Every accepted job and every open connection is held in a registry until it
// completes.  Registration hands back a guard (`JobLease`,
// `ConnectionGuard`); dropping or explicitly releasing the guard removes the
// entry exactly once, so a job that reports completion twice cannot double
// free its slot.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, warn};

use printhtml_core::types::{JobId, JobKind, JobTicket};

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

struct JobTable {
    live: Mutex<HashMap<JobId, JobTicket>>,
    admitted: AtomicU64,
    completed: AtomicU64,
    /// Publishes the number of live jobs after every change.
    live_count: watch::Sender<usize>,
}

/// Registry of live print and scan jobs. Cheap to clone.
#[derive(Clone)]
pub struct JobRegistry {
    table: Arc<JobTable>,
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        let (live_count, _) = watch::channel(0);
        Self {
            table: Arc::new(JobTable {
                live: Mutex::new(HashMap::new()),
                admitted: AtomicU64::new(0),
                completed: AtomicU64::new(0),
                live_count,
            }),
        }
    }

    /// Register a new job of `kind` and return the lease that owns it.
    pub fn admit(&self, kind: JobKind) -> JobLease {
        let ticket = JobTicket::new(kind);
        match self.table.live.lock() {
            Ok(mut live) => {
                live.insert(ticket.id, ticket.clone());
                self.table.live_count.send_replace(live.len());
            }
            Err(e) => warn!(error = %e, "job registry lock poisoned"),
        }
        self.table.admitted.fetch_add(1, Ordering::Relaxed);
        debug!(job_id = %ticket.id, kind = ?kind, "job admitted");
        JobLease {
            ticket,
            registry: self.clone(),
            released: false,
        }
    }

    /// Remove `id`. Returns `false` when it was already gone.
    fn release(&self, id: JobId) -> bool {
        let removed = match self.table.live.lock() {
            Ok(mut live) => {
                let removed = live.remove(&id).is_some();
                self.table.live_count.send_replace(live.len());
                removed
            }
            Err(e) => {
                warn!(error = %e, "job registry lock poisoned");
                false
            }
        };
        if removed {
            self.table.completed.fetch_add(1, Ordering::Relaxed);
            debug!(job_id = %id, "job released");
        } else {
            warn!(job_id = %id, "duplicate job completion ignored");
        }
        removed
    }

    /// Number of jobs currently holding a lease.
    pub fn live(&self) -> usize {
        *self.table.live_count.borrow()
    }

    /// Total jobs ever admitted.
    pub fn admitted(&self) -> u64 {
        self.table.admitted.load(Ordering::Relaxed)
    }

    /// Total jobs released.
    pub fn completed(&self) -> u64 {
        self.table.completed.load(Ordering::Relaxed)
    }

    /// Tickets of all live jobs, oldest first.
    pub fn snapshot(&self) -> Vec<JobTicket> {
        let mut tickets: Vec<JobTicket> = self
            .table
            .live
            .lock()
            .map(|live| live.values().cloned().collect())
            .unwrap_or_default();
        tickets.sort_by_key(|t| t.accepted_at);
        tickets
    }

    /// Resolve once no job is live.
    pub async fn wait_idle(&self) {
        let mut rx = self.table.live_count.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("live", &self.live())
            .field("admitted", &self.admitted())
            .finish()
    }
}

/// Exclusive ownership of one registered job.
///
/// The job stays registered until [`JobLease::release`] is called or the
/// lease is dropped, whichever happens first.
pub struct JobLease {
    ticket: JobTicket,
    registry: JobRegistry,
    released: bool,
}

impl JobLease {
    pub fn id(&self) -> JobId {
        self.ticket.id
    }

    pub fn ticket(&self) -> &JobTicket {
        &self.ticket
    }

    /// Report completion. Returns `true` if this call freed the slot.
    pub fn release(mut self) -> bool {
        self.release_once()
    }

    fn release_once(&mut self) -> bool {
        if self.released {
            return false;
        }
        self.released = true;
        self.registry.release(self.ticket.id)
    }
}

impl Drop for JobLease {
    fn drop(&mut self) {
        self.release_once();
    }
}

impl std::fmt::Debug for JobLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobLease")
            .field("ticket", &self.ticket)
            .field("released", &self.released)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Connections
// ---------------------------------------------------------------------------

/// Identity of an accepted connection, unique for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

#[derive(Default)]
struct ConnectionTable {
    live: Mutex<HashMap<ConnectionId, SocketAddr>>,
    next_id: AtomicU64,
}

/// Registry of open client connections. Cheap to clone.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    table: Arc<ConnectionTable>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection from `peer` until the guard is dropped.
    pub fn register(&self, peer: SocketAddr) -> ConnectionGuard {
        let id = ConnectionId(self.table.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        if let Ok(mut live) = self.table.live.lock() {
            live.insert(id, peer);
        }
        ConnectionGuard {
            id,
            registry: self.clone(),
        }
    }

    pub fn active(&self) -> usize {
        self.table.live.lock().map(|live| live.len()).unwrap_or(0)
    }

    fn remove(&self, id: ConnectionId) {
        if let Ok(mut live) = self.table.live.lock() {
            live.remove(&id);
        }
    }
}

/// Keeps a connection registered while its handler runs.
pub struct ConnectionGuard {
    id: ConnectionId,
    registry: ConnectionRegistry,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn lease_registers_until_released() {
        let registry = JobRegistry::new();
        let lease = registry.admit(JobKind::Print);
        let id = lease.id();
        assert_eq!(registry.snapshot()[0].id, id);
        assert_eq!(registry.live(), 1);

        assert!(lease.release());
        assert!(registry.snapshot().is_empty());
        assert_eq!(registry.live(), 0);
        assert_eq!((registry.admitted(), registry.completed()), (1, 1));
    }

    #[test]
    fn dropping_lease_releases_once() {
        let registry = JobRegistry::new();
        {
            let _lease = registry.admit(JobKind::Scan);
            assert_eq!(registry.live(), 1);
        }
        assert_eq!(registry.live(), 0);
        assert_eq!(registry.completed(), 1);
    }

    #[test]
    fn duplicate_release_is_ignored() {
        let registry = JobRegistry::new();
        let lease = registry.admit(JobKind::Print);
        let id = lease.id();
        assert!(lease.release());
        // A stray second completion for the same job.
        assert!(!registry.release(id));
        assert_eq!(registry.completed(), 1);
    }

    #[test]
    fn releasing_one_job_leaves_others() {
        let registry = JobRegistry::new();
        let a = registry.admit(JobKind::Print);
        let b = registry.admit(JobKind::ScanRender);
        let b_id = b.id();
        drop(a);
        assert_eq!(registry.live(), 1);
        assert_eq!(registry.snapshot()[0].id, b_id);
    }

    #[tokio::test]
    async fn wait_idle_resolves_after_last_release() {
        let registry = JobRegistry::new();
        let lease = registry.admit(JobKind::Scan);
        let waiter = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.wait_idle().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());
        drop(lease);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("idle")
            .expect("join");
    }

    #[test]
    fn connection_guard_unregisters_on_drop() {
        let registry = ConnectionRegistry::new();
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let a = registry.register(peer);
        let b = registry.register(peer);
        assert_ne!(a.id(), b.id());
        assert_eq!(registry.active(), 2);
        drop(a);
        assert_eq!(registry.active(), 1);
        drop(b);
        assert_eq!(registry.active(), 0);
    }
}

//! Pooled SQLite access.
//!
//! Every call runs on the blocking thread pool. The pool caps concurrent
//! checkouts at `max_open`, keeps up to `max_idle` warm connections and
//! retires connections older than `max_lifetime`. Dropping the future
//! returned by [`Db::with_connection`] interrupts the running statement.

use rusqlite::{Connection, InterruptHandle};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task;

use crate::config::StoreConfig;
use crate::error::{Result, WikidiceError};

pub mod migrate;

const PRAGMAS: &str = "PRAGMA journal_mode = WAL; \
     PRAGMA synchronous = NORMAL; \
     PRAGMA temp_store = MEMORY; \
     PRAGMA cache_size = -65536; \
     PRAGMA mmap_size = 268435456;";

/// Database connection pool handle. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct Db {
    inner: Arc<Pool>,
}

struct Pool {
    path: PathBuf,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<PooledConnection>>,
    max_idle: usize,
    max_lifetime: Duration,
}

struct PooledConnection {
    conn: Connection,
    opened_at: Instant,
}

#[derive(Default)]
struct CancelSlot {
    handle: Option<InterruptHandle>,
    cancelled: bool,
}

/// Interrupts the in-flight statement if the caller stops waiting for it.
struct InterruptOnDrop {
    slot: Arc<Mutex<CancelSlot>>,
    armed: bool,
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slot = lock(&self.slot);
        slot.cancelled = true;
        if let Some(handle) = slot.handle.take() {
            log::debug!("Interrupting abandoned store call");
            handle.interrupt();
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Db {
    /// Create a pool with default limits (10 open, 10 idle, 10 minute lifetime)
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self::with_limits(db_path, &StoreConfig::default())
    }

    /// Create a pool with explicit limits
    pub fn with_limits<P: AsRef<Path>>(db_path: P, limits: &StoreConfig) -> Self {
        Self {
            inner: Arc::new(Pool {
                path: db_path.as_ref().to_path_buf(),
                permits: Arc::new(Semaphore::new(limits.max_open_connections.max(1))),
                idle: Mutex::new(Vec::new()),
                max_idle: limits.max_idle_connections,
                max_lifetime: limits.conn_max_lifetime(),
            }),
        }
    }

    /// Number of connections currently parked in the pool
    pub fn idle_connections(&self) -> usize {
        lock(&self.inner.idle).len()
    }

    /// Execute a closure with a pooled connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let permit = Arc::clone(&self.inner.permits)
            .acquire_owned()
            .await
            .map_err(|_| WikidiceError::StoreUnavailable("connection pool is closed".to_string()))?;

        let slot = Arc::new(Mutex::new(CancelSlot::default()));
        let mut guard = InterruptOnDrop {
            slot: Arc::clone(&slot),
            armed: true,
        };
        let pool = Arc::clone(&self.inner);

        let joined = task::spawn_blocking(move || {
            // The permit is held until the blocking work really finishes.
            let _permit = permit;
            let mut pooled = pool.checkout()?;
            {
                let mut s = lock(&slot);
                if s.cancelled {
                    return Err(WikidiceError::StoreUnavailable(
                        "store call abandoned before it started".to_string(),
                    ));
                }
                s.handle = Some(pooled.conn.get_interrupt_handle());
            }

            let result = f(&mut pooled.conn);

            let cancelled = {
                let mut s = lock(&slot);
                s.handle = None;
                s.cancelled
            };
            // an interrupted connection may still carry the interrupt flag
            if !cancelled {
                pool.checkin(pooled);
            }
            result
        })
        .await;

        guard.armed = false;
        joined.map_err(|e| WikidiceError::Internal(format!("store task failed: {}", e)))?
    }

    /// Check that the store answers a trivial query
    pub async fn ping(&self) -> Result<()> {
        self.with_connection(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
                .map_err(|e| WikidiceError::StoreUnavailable(e.to_string()))?;
            Ok(())
        })
        .await
    }
}

impl Pool {
    fn checkout(&self) -> Result<PooledConnection> {
        loop {
            let candidate = lock(&self.idle).pop();
            match candidate {
                Some(pooled) if pooled.opened_at.elapsed() < self.max_lifetime => return Ok(pooled),
                Some(_) => {
                    log::debug!("Retiring pooled connection past its lifetime");
                    continue;
                }
                None => break,
            }
        }
        let conn = open(&self.path)?;
        Ok(PooledConnection {
            conn,
            opened_at: Instant::now(),
        })
    }

    fn checkin(&self, pooled: PooledConnection) {
        if pooled.opened_at.elapsed() >= self.max_lifetime {
            return;
        }
        let mut idle = lock(&self.idle);
        if idle.len() < self.max_idle {
            idle.push(pooled);
        }
    }
}

fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(|e| {
        WikidiceError::StoreUnavailable(format!("cannot open {}: {}", path.display(), e))
    })?;
    conn.execute_batch(PRAGMAS)?;
    Ok(conn)
}

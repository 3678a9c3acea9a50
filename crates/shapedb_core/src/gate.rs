//! Serialized operation gate.
//!
//! Every collection operation runs under an [`OperationGate`]. At most one
//! operation per gate touches the engine at a time, and waiting operations
//! are admitted in the order they first asked.

use crate::error::{CoreError, CoreResult};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;

static PROCESS_GATE: OnceLock<OperationGate> = OnceLock::new();

/// A FIFO mutual-exclusion domain for engine operations.
///
/// Clones share the same domain. Once an operation has been admitted its work
/// runs to completion on a spawned task, even if the caller stops waiting
/// for the result; the gate is released only when that work finishes.
///
/// # Example
///
/// ```rust
/// use shapedb_core::OperationGate;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let gate = OperationGate::new();
/// let answer = gate.run_exclusive(|| async { Ok(42) }).await.unwrap();
/// assert_eq!(answer, 42);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct OperationGate {
    lock: Arc<Mutex<()>>,
    pending: Arc<AtomicUsize>,
}

/// Counts a caller as pending for as long as it is alive.
struct Ticket(Arc<AtomicUsize>);

impl Ticket {
    fn issue(pending: &Arc<AtomicUsize>) -> Self {
        pending.fetch_add(1, Ordering::AcqRel);
        Self(Arc::clone(pending))
    }
}

impl Drop for Ticket {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl OperationGate {
    /// Creates an independent gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the gate shared by the whole process.
    #[must_use]
    pub fn process_wide() -> Self {
        PROCESS_GATE.get_or_init(Self::new).clone()
    }

    /// Returns true if both gates serialize against each other.
    #[must_use]
    pub fn same_domain(&self, other: &OperationGate) -> bool {
        Arc::ptr_eq(&self.lock, &other.lock)
    }

    /// Number of callers currently waiting on or running under this gate.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Runs `work` once every earlier caller has finished.
    ///
    /// `work` is invoked only after the gate is acquired, and the future it
    /// returns runs on its own task while the gate is held.
    ///
    /// # Errors
    ///
    /// Returns whatever `work` returns, or `TaskFailed` if its task
    /// panicked.
    pub async fn run_exclusive<T, F, Fut>(&self, work: F) -> CoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = CoreResult<T>> + Send + 'static,
    {
        let _ticket = Ticket::issue(&self.pending);
        let permit = Arc::clone(&self.lock).lock_owned().await;
        let operation = work();

        let task = tokio::spawn(async move {
            let _permit = permit;
            operation.await
        });

        match task.await {
            Ok(result) => result,
            Err(err) => Err(CoreError::task_failed(err.to_string())),
        }
    }
}

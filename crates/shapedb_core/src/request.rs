//! Bridges single-shot engine completions into futures.

use shapedb_storage::{Completion, StorageError, StorageResult};
use std::future::Future;
use tokio::sync::oneshot;
use tracing::warn;

/// Submits one engine request and returns a future for its completion.
///
/// `submit` is called immediately with the completion to hand the engine.
/// If the engine drops the completion without calling it, the future
/// resolves to `Aborted`.
pub(crate) fn single_shot<T, S>(submit: S) -> impl Future<Output = StorageResult<T>> + Send
where
    T: Send + 'static,
    S: FnOnce(Completion<T>),
{
    let (tx, rx) = oneshot::channel();
    submit(Box::new(move |result| {
        if tx.send(result).is_err() {
            warn!("engine completed a request nobody is waiting for");
        }
    }));

    async move {
        match rx.await {
            Ok(result) => result,
            Err(_) => {
                warn!("engine dropped a completion without calling it");
                Err(StorageError::Aborted(
                    "completion dropped without a result".to_string(),
                ))
            }
        }
    }
}

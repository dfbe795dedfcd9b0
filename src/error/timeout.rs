/// Deadline wrapper for a single operation attempt
///
/// The call runs on a worker thread; if it has not answered by the deadline
/// the caller gets a Transient `Timeout` error and the worker's eventual
/// result is discarded. The worker itself is not cancelled.
use crate::{OperationError, OperationResult};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

pub fn with_timeout<T, F>(deadline: Duration, operation: F) -> OperationResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> OperationResult<T> + Send + 'static,
{
    let (tx, rx) = mpsc::channel();

    let spawned = thread::Builder::new()
        .name("dispatch-attempt".to_string())
        .spawn(move || {
            // Receiver may be gone after a timeout
            let _ = tx.send(operation());
        });

    if let Err(e) = spawned {
        return Err(OperationError::Transient(format!(
            "failed to spawn worker thread: {}",
            e
        )));
    }

    match rx.recv_timeout(deadline) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => {
            tracing::warn!(
                deadline = %humantime::format_duration(deadline),
                "Operation attempt timed out"
            );
            Err(OperationError::Timeout(deadline))
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(OperationError::Transient(
            "operation worker terminated without a result".to_string(),
        )),
    }
}

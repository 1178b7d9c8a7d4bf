//! Deadline enforcement for collaborator calls.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use crate::reasoning::CollaboratorError;

/// Run `call`, waiting at most `timeout` for its result.
///
/// With no timeout the call runs inline on the current thread. Otherwise it
/// runs on a dedicated worker thread; on expiry the worker is detached and
/// whatever it eventually produces is dropped.
pub fn call_with_timeout<T, F>(timeout: Option<Duration>, call: F) -> Result<T, CollaboratorError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, CollaboratorError> + Send + 'static,
{
    let Some(limit) = timeout else {
        return call();
    };

    let (tx, rx) = mpsc::sync_channel(1);
    thread::Builder::new()
        .name("regimelab-collaborator".into())
        .spawn(move || {
            // The receiver is gone once the deadline has passed.
            let _ = tx.send(call());
        })
        .map_err(|e| CollaboratorError::Unavailable(format!("failed to spawn worker: {e}")))?;

    match rx.recv_timeout(limit) {
        Ok(result) => result,
        Err(mpsc::RecvTimeoutError::Timeout) => Err(CollaboratorError::Timeout(limit)),
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(CollaboratorError::Unavailable(
            "collaborator worker panicked".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inline_without_timeout() {
        let caller = thread::current().id();
        let ran_on = call_with_timeout(None, move || Ok(thread::current().id())).unwrap();
        assert_eq!(ran_on, caller);
    }

    #[test]
    fn fast_call_returns_value() {
        let value = call_with_timeout(Some(Duration::from_secs(5)), || Ok(42)).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn slow_call_times_out() {
        let limit = Duration::from_millis(20);
        let result: Result<(), _> = call_with_timeout(Some(limit), || {
            thread::sleep(Duration::from_millis(300));
            Ok(())
        });
        assert_eq!(result, Err(CollaboratorError::Timeout(limit)));
    }

    #[test]
    fn errors_pass_through() {
        let result: Result<(), _> = call_with_timeout(Some(Duration::from_secs(5)), || {
            Err(CollaboratorError::ContractViolation("bad".into()))
        });
        assert_eq!(
            result,
            Err(CollaboratorError::ContractViolation("bad".into()))
        );
    }

    #[test]
    fn panicking_worker_is_unavailable() {
        let result: Result<(), _> =
            call_with_timeout(Some(Duration::from_secs(5)), || panic!("boom"));
        assert!(matches!(result, Err(CollaboratorError::Unavailable(_))));
    }
}

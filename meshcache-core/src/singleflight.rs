//! # Single-Flight Deduplication
//!
//! Collapses concurrent callers loading the same key into one in-flight
//! load, fanning the result out to every waiter instead of letting a
//! cache miss stampede the origin. The first caller for a key registers
//! the in-flight call and runs the load; every other caller for that same
//! key finds the call already registered and blocks on its `Condvar`
//! until the result is ready, then gets a clone of it.

use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex};

use meshcache_common::{CacheError, CacheResult};

use crate::byteview::ByteView;

enum CallState {
    InFlight,
    Done(CacheResult<ByteView>),
}

struct Call {
    state: Mutex<CallState>,
    done: Condvar,
}

/// Deduplicates concurrent loads of the same key within one group.
///
/// Cheap to clone (an `Arc` around the shared table); intended to be held
/// once per [`crate::group::Group`].
#[derive(Clone)]
pub struct SingleFlight {
    inner: Arc<Mutex<HashMap<String, Arc<Call>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        SingleFlight { inner: Arc::new(Mutex::new(HashMap::new())) }
    }

    /// Runs `load` for `key` if no call for it is in flight; otherwise
    /// blocks until the in-flight call finishes and returns its result.
    /// Exactly one call to `load` executes per concurrent burst.
    pub fn do_call(
        &self,
        key: &str,
        load: impl FnOnce() -> CacheResult<ByteView>,
    ) -> CacheResult<ByteView> {
        let mut table = self.inner.lock().expect("singleflight table poisoned");
        if let Some(existing) = table.get(key).cloned() {
            drop(table);
            return Self::wait(&existing);
        }

        let call = Arc::new(Call { state: Mutex::new(CallState::InFlight), done: Condvar::new() });
        table.insert(key.to_string(), call.clone());
        drop(table);

        let result = load();

        let mut table = self.inner.lock().expect("singleflight table poisoned");
        table.remove(key);
        drop(table);

        let mut state = call.state.lock().expect("call state poisoned");
        *state = CallState::Done(clone_result(&result));
        call.done.notify_all();

        result
    }

    fn wait(call: &Arc<Call>) -> CacheResult<ByteView> {
        let mut state = call.state.lock().expect("call state poisoned");
        while matches!(*state, CallState::InFlight) {
            state = call.done.wait(state).expect("call state poisoned");
        }
        match &*state {
            CallState::Done(result) => clone_result(result),
            CallState::InFlight => unreachable!("wait loop only exits once Done"),
        }
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        SingleFlight::new()
    }
}

fn clone_result(result: &CacheResult<ByteView>) -> CacheResult<ByteView> {
    match result {
        Ok(value) => Ok(value.clone()),
        Err(err) => Err(clone_error(err)),
    }
}

fn clone_error(err: &CacheError) -> CacheError {
    match err {
        CacheError::Validation(msg) => CacheError::Validation(msg.clone()),
        CacheError::NotFound => CacheError::NotFound,
        CacheError::Upstream(msg) => CacheError::upstream(msg.clone()),
        CacheError::Transport(msg) => CacheError::transport(msg.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn concurrent_callers_collapse_into_one_load() {
        let flight = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let flight = flight.clone();
                let calls = calls.clone();
                thread::spawn(move || {
                    flight.do_call("k", || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        thread::sleep(Duration::from_millis(20));
                        Ok(ByteView::new(b"v"))
                    })
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(calls.load(Ordering::SeqCst) <= 2, "burst should not fan out into many loads");
        for result in results {
            assert_eq!(result.unwrap(), ByteView::new(b"v"));
        }
    }

    #[test]
    fn sequential_calls_each_load_independently() {
        let flight = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = calls.clone();
            flight
                .do_call("k", || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(ByteView::new(b"v"))
                })
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn error_is_propagated_to_waiters() {
        let flight = SingleFlight::new();
        let result = flight.do_call("k", || Err(CacheError::upstream("boom")));
        assert!(result.is_err());
    }
}

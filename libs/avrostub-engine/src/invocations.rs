use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Weak};

use bytes::Bytes;

use crate::lock;

/// Arguments of one `produce` call, recorded whether or not it succeeded.
#[derive(Debug, Clone, PartialEq)]
pub struct ProduceCall {
    pub topic: String,
    pub partition: i32,
    pub key: Option<Bytes>,
    pub value: serde_json::Value,
}

/// Message coordinates of one `commit` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitCall {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
}

/// Append-only call history owned by one facade.
///
/// Every `record` also bumps the running total of the `CallRegistry` the
/// log was issued by, so totals outlive the facade.
#[derive(Debug)]
pub struct InvocationLog<T> {
    calls: Mutex<Vec<T>>,
    total: Arc<AtomicUsize>,
}

impl<T> Default for InvocationLog<T> {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            total: Arc::default(),
        }
    }
}

impl<T: Clone> InvocationLog<T> {
    pub fn record(&self, call: T) {
        lock::lock(&self.calls, "invocation log").push(call);
        self.total.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        lock::lock(&self.calls, "invocation log").len()
    }

    pub fn calls(&self) -> Vec<T> {
        lock::lock(&self.calls, "invocation log").clone()
    }

    pub fn clear(&self) {
        lock::lock(&self.calls, "invocation log").clear();
    }
}

/// Issues one `InvocationLog` per facade and keeps the stub-wide total.
///
/// Logs are held weakly: a dropped facade's history goes with it, its calls
/// stay in `total`.
#[derive(Debug)]
pub(crate) struct CallRegistry<T> {
    logs: Mutex<Vec<Weak<InvocationLog<T>>>>,
    total: Arc<AtomicUsize>,
}

impl<T> Default for CallRegistry<T> {
    fn default() -> Self {
        Self {
            logs: Mutex::new(Vec::new()),
            total: Arc::default(),
        }
    }
}

impl<T: Clone> CallRegistry<T> {
    pub(crate) fn track(&self) -> Arc<InvocationLog<T>> {
        let log = Arc::new(InvocationLog {
            calls: Mutex::new(Vec::new()),
            total: self.total.clone(),
        });
        let mut logs = lock::lock(&self.logs, "call registry");
        logs.retain(|w| w.strong_count() > 0);
        logs.push(Arc::downgrade(&log));
        log
    }

    /// Calls recorded since construction or the last `clear`, dropped
    /// facades included.
    pub(crate) fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Empty every live log and zero the total.
    pub(crate) fn clear(&self) {
        let mut logs = lock::lock(&self.logs, "call registry");
        logs.retain(|w| w.strong_count() > 0);
        for log in logs.iter().filter_map(Weak::upgrade) {
            log.clear();
        }
        self.total.store(0, Ordering::SeqCst);
    }

    /// Logs still owned by a facade.
    #[cfg(test)]
    pub(crate) fn live(&self) -> usize {
        let mut logs = lock::lock(&self.logs, "call registry");
        logs.retain(|w| w.strong_count() > 0);
        logs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(offset: i64) -> CommitCall {
        CommitCall {
            topic: "t".into(),
            partition: 0,
            offset,
        }
    }

    #[test]
    fn dropped_logs_are_released_but_still_counted() {
        let registry = CallRegistry::<CommitCall>::default();
        for i in 0..1000 {
            let log = registry.track();
            log.record(commit(i));
        }
        let kept = registry.track();
        kept.record(commit(0));

        assert_eq!(registry.live(), 1);
        assert_eq!(registry.total(), 1001);
        assert_eq!(kept.count(), 1);
    }

    #[test]
    fn clear_empties_live_logs_and_the_total() {
        let registry = CallRegistry::<CommitCall>::default();
        let a = registry.track();
        let b = registry.track();
        a.record(commit(0));
        b.record(commit(1));
        b.record(commit(2));
        drop(a);

        registry.clear();

        assert_eq!(registry.total(), 0);
        assert_eq!(b.count(), 0);
        assert_eq!(registry.live(), 1);
        b.record(commit(3));
        assert_eq!(registry.total(), 1);
    }
}

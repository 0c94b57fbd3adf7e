//! Lock helpers that recover from poisoning instead of propagating it.
//!
//! A panicking listener must not take the whole stub down with it; the
//! guarded state is still consistent because every critical section
//! only pushes or overwrites whole values.

use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

pub(crate) fn lock<'a, T>(mutex: &'a Mutex<T>, what: &str) -> MutexGuard<'a, T> {
    match mutex.lock() {
        Ok(g) => g,
        Err(poisoned) => {
            tracing::warn!(lock = what, "mutex was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

pub(crate) fn read<'a, T>(rw: &'a RwLock<T>, what: &str) -> RwLockReadGuard<'a, T> {
    match rw.read() {
        Ok(g) => g,
        Err(poisoned) => {
            tracing::warn!(lock = what, "read lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

pub(crate) fn write<'a, T>(rw: &'a RwLock<T>, what: &str) -> RwLockWriteGuard<'a, T> {
    match rw.write() {
        Ok(g) => g,
        Err(poisoned) => {
            tracing::warn!(lock = what, "write lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

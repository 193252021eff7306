//! Opaque handles.
//!
//! Objects live in per-kind registries keyed by ids from one process-wide
//! counter. A handle is its id carried in a pointer-typed value, so C sees
//! `Context *`, `Image *` and so on, but the value is never dereferenced.
//! Ids are never reused: a destroyed handle stays invalid even after
//! another object of the same kind is created.

use crate::error::{FfiError, FfiResult};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use std::ptr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Next handle id. `0` is the null handle.
static NEXT_ID: AtomicUsize = AtomicUsize::new(1);

/// Live objects of one kind, handed out as `*mut H`.
///
/// Lookups return a clone of the object's `Arc`, so an object destroyed
/// while another call is still using it is dropped when that call ends.
pub(crate) struct HandleSet<H, T = H> {
    kind: &'static str,
    live: Mutex<BTreeMap<usize, Arc<T>>>,
    _handle: PhantomData<fn() -> H>,
}

impl<H, T> HandleSet<H, T> {
    pub(crate) const fn new(kind: &'static str) -> Self {
        Self {
            kind,
            live: Mutex::new(BTreeMap::new()),
            _handle: PhantomData,
        }
    }

    /// Registers `value` under a fresh id.
    pub(crate) fn insert(&self, value: T) -> *mut H {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        self.live.lock().insert(id, Arc::new(value));
        tracing::debug!(kind = self.kind, handle = id, "created handle");
        ptr::without_provenance_mut(id)
    }

    fn id(&self, handle: *const H) -> FfiResult<usize> {
        match handle.addr() {
            0 => Err(FfiError::NullPointer(self.kind)),
            id => Ok(id),
        }
    }

    /// Looks up a live handle.
    pub(crate) fn get(&self, handle: *const H) -> FfiResult<Arc<T>> {
        let id = self.id(handle)?;
        self.live
            .lock()
            .get(&id)
            .cloned()
            .ok_or(FfiError::InvalidHandle(self.kind))
    }

    /// Unregisters a live handle, returning its object.
    pub(crate) fn remove(&self, handle: *const H) -> FfiResult<Arc<T>> {
        let id = self.id(handle)?;
        let value = self
            .live
            .lock()
            .remove(&id)
            .ok_or(FfiError::InvalidHandle(self.kind))?;
        tracing::debug!(kind = self.kind, handle = id, "destroyed handle");
        Ok(value)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.live.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_lifecycle() {
        let set = HandleSet::<u32>::new("number");
        let handle = set.insert(7);
        assert!(!handle.is_null());
        assert_eq!(set.len(), 1);
        assert_eq!(*set.get(handle).unwrap(), 7);

        assert_eq!(*set.remove(handle).unwrap(), 7);
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_stale_handle_never_aliases() {
        let set = HandleSet::<u32>::new("number");
        let stale = set.insert(1);
        set.remove(stale).unwrap();

        let fresh = set.insert(2);
        assert_ne!(stale, fresh);
        assert!(matches!(
            set.get(stale),
            Err(FfiError::InvalidHandle("number"))
        ));
        assert!(matches!(
            set.remove(stale),
            Err(FfiError::InvalidHandle("number"))
        ));
        assert_eq!(*set.get(fresh).unwrap(), 2);
    }

    #[test]
    fn test_null_and_foreign_handles() {
        let numbers = HandleSet::<u32>::new("number");
        let names = HandleSet::<String>::new("name");
        let name = names.insert("a".to_string());

        assert!(matches!(
            numbers.get(ptr::null()),
            Err(FfiError::NullPointer("number"))
        ));
        assert!(matches!(
            numbers.get(name.cast::<u32>()),
            Err(FfiError::InvalidHandle("number"))
        ));
    }

    #[test]
    fn test_removed_object_outlives_lookup() {
        let set = HandleSet::<Vec<u8>>::new("bytes");
        let handle = set.insert(vec![1, 2, 3]);
        let in_use = set.get(handle).unwrap();
        set.remove(handle).unwrap();
        assert_eq!(*in_use, vec![1, 2, 3]);
    }
}

//! Cache double that runs a one-shot callback around a matching key, used to
//! line up a concurrent operation at an exact point of a cache round trip.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{CacheError, InMemoryCache, KeyValueCache};

type Hook = Box<dyn FnOnce() + Send>;

#[derive(Default)]
pub(crate) struct HookedCache {
    inner: Arc<InMemoryCache>,
    before_get: Mutex<Option<(String, Hook)>>,
    after_set: Mutex<Option<(String, Hook)>>,
}

impl HookedCache {
    pub(crate) fn wrapping(inner: Arc<InMemoryCache>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            ..Self::default()
        })
    }

    /// Run `hook` once, before the next `get` of a key containing `key_part`.
    pub(crate) fn before_get(&self, key_part: &str, hook: impl FnOnce() + Send + 'static) {
        *self.before_get.lock().unwrap() = Some((key_part.to_string(), Box::new(hook)));
    }

    /// Run `hook` once, after the next `set` of a key containing `key_part`.
    pub(crate) fn after_set(&self, key_part: &str, hook: impl FnOnce() + Send + 'static) {
        *self.after_set.lock().unwrap() = Some((key_part.to_string(), Box::new(hook)));
    }

    fn take(slot: &Mutex<Option<(String, Hook)>>, key: &str) -> Option<Hook> {
        let mut slot = slot.lock().unwrap();
        match slot.as_ref() {
            Some((part, _)) if key.contains(part.as_str()) => slot.take().map(|(_, hook)| hook),
            _ => None,
        }
    }
}

impl KeyValueCache for HookedCache {
    fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        if let Some(hook) = Self::take(&self.before_get, key) {
            hook();
        }
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let result = self.inner.set(key, value, ttl);
        if let Some(hook) = Self::take(&self.after_set, key) {
            hook();
        }
        result
    }

    fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.inner.delete(key)
    }
}

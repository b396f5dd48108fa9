//! Backend-availability probing.
//!
//! Opening a backend context to check whether it works is not free (it talks
//! to a real driver), so the result is cached for the process lifetime the
//! same way `fluxgpu-hal`'s Vulkan backend caches its debug-utils-messenger
//! setup behind a `once_cell`: the first caller pays the probe cost, every
//! later caller in this process gets the cached answer.

use std::collections::HashMap;

use fluxgpu_types::Backend;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;

static CACHE: OnceCell<Mutex<HashMap<Backend, bool>>> = OnceCell::new();

fn cache() -> &'static Mutex<HashMap<Backend, bool>> {
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Returns whether `backend` is available, running `probe` at most once per
/// process and caching the result thereafter.
pub(crate) fn is_available(backend: Backend, probe: impl FnOnce() -> bool) -> bool {
    if let Some(&cached) = cache().lock().get(&backend) {
        return cached;
    }
    let available = probe();
    cache().lock().insert(backend, available);
    available
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_probe_reuses_cached_result_without_rerunning() {
        // Other tests in this binary may have already probed `Host`; only
        // assert the call count when we can see this is the first probe.
        let already_cached = cache().lock().contains_key(&Backend::Host);
        let mut calls = 0;
        let first = is_available(Backend::Host, || {
            calls += 1;
            true
        });
        let second = is_available(Backend::Host, || {
            calls += 1;
            true
        });
        assert_eq!(first, second);
        if !already_cached {
            assert_eq!(calls, 1);
        }
    }
}

//! Process-wide cache of compiled `matches` patterns (§4.1 "Regex compilation cache").
//!
//! An invalid pattern is cached as `None` so a malformed rule does not re-attempt
//! compilation (and re-log the failure) on every evaluation.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Upper bound on distinct patterns cached; beyond this the cache is cleared and
/// rebuilt, trading a compilation spike for bounded memory (policies rarely carry more
/// than a few hundred distinct regex patterns across all their rules).
const MAX_CACHED_PATTERNS: usize = 2048;

static CACHE: Lazy<RwLock<HashMap<String, Option<Arc<Regex>>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Return the compiled pattern for `pattern`, compiling and caching it on first use.
/// `None` means `pattern` failed to compile; callers should treat that as "no match".
pub fn compiled_pattern(pattern: &str) -> Option<Arc<Regex>> {
    if let Some(hit) = CACHE.read().unwrap().get(pattern) {
        return hit.clone();
    }
    let compiled = Regex::new(pattern).ok().map(Arc::new);
    let mut w = CACHE.write().unwrap();
    if w.len() >= MAX_CACHED_PATTERNS {
        w.clear();
    }
    w.insert(pattern.to_string(), compiled.clone());
    compiled
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn caches_valid_pattern() {
        let a = compiled_pattern("^abc$");
        let b = compiled_pattern("^abc$");
        assert!(a.is_some());
        assert!(Arc::ptr_eq(&a.unwrap(), &b.unwrap()));
    }

    #[test]
    fn invalid_pattern_caches_as_none() {
        assert!(compiled_pattern("[invalid(").is_none());
        assert!(compiled_pattern("[invalid(").is_none());
    }
}

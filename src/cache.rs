//!
//! The linker cache.
//!

use std::cell::Cell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::buffer::LlvmBuffer;
use crate::dependency::SourceKind;
use crate::target::Architecture;

///
/// The linker cache key.
///
/// The key is computed from the cheapest representation of a dependency: the raw buffer
/// before any compilation, not the compiled module.
///
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// The SHA-256 digest of the raw buffer.
    pub digest: String,
    /// The raw buffer kind.
    pub kind: SourceKind,
    /// The target architecture.
    pub architecture: Architecture,
    /// The ahead-of-link compiler options.
    pub options: Vec<String>,
}

impl CacheKey {
    ///
    /// A shortcut constructor.
    ///
    pub fn new(
        digest: String,
        kind: SourceKind,
        architecture: Architecture,
        options: Vec<String>,
    ) -> Self {
        Self {
            digest,
            kind,
            architecture,
            options,
        }
    }
}

///
/// The content-addressed cache of compiled link-time dependencies.
///
/// Shared by every library of one `Codegen`. Entries are never evicted.
///
#[derive(Debug, Default)]
pub struct LinkerCache {
    /// The cached modules.
    entries: RefCell<HashMap<CacheKey, Rc<LlvmBuffer>>>,
    /// The number of lookups answered from the cache.
    hits: Cell<usize>,
    /// The number of lookups which missed.
    misses: Cell<usize>,
}

impl LinkerCache {
    ///
    /// Returns the cached module, if any.
    ///
    pub fn get(&self, key: &CacheKey) -> Option<Rc<LlvmBuffer>> {
        let entry = self.entries.borrow().get(key).cloned();
        match entry {
            Some(_) => self.hits.set(self.hits.get() + 1),
            None => self.misses.set(self.misses.get() + 1),
        }
        tracing::debug!(
            architecture = %key.architecture,
            digest = key.digest.as_str(),
            hit = entry.is_some(),
            "linker cache lookup"
        );
        entry
    }

    ///
    /// Returns the cached module, or computes and inserts it with `create`.
    ///
    /// Nothing is inserted if `create` fails.
    ///
    pub fn get_or_insert<F>(&self, key: CacheKey, create: F) -> anyhow::Result<Rc<LlvmBuffer>>
    where
        F: FnOnce() -> anyhow::Result<LlvmBuffer>,
    {
        if let Some(entry) = self.get(&key) {
            return Ok(entry);
        }

        let entry = Rc::new(create()?);
        self.entries.borrow_mut().insert(key, entry.clone());
        Ok(entry)
    }

    ///
    /// Returns the number of cached modules.
    ///
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    ///
    /// Checks whether the cache is empty.
    ///
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    ///
    /// Drops every cached module and resets the statistics.
    ///
    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
        self.hits.set(0);
        self.misses.set(0);
    }

    ///
    /// Returns the number of lookups answered from the cache.
    ///
    pub fn hits(&self) -> usize {
        self.hits.get()
    }

    ///
    /// Returns the number of lookups which missed.
    ///
    pub fn misses(&self) -> usize {
        self.misses.get()
    }
}

#[cfg(test)]
mod tests {
    use super::CacheKey;
    use super::LinkerCache;
    use crate::buffer::LlvmBuffer;
    use crate::dependency::SourceKind;
    use crate::target::Architecture;

    fn key(architecture: &str, options: &[&str]) -> CacheKey {
        CacheKey::new(
            crate::hashes::sha256(b"__global__ void f() {}"),
            SourceKind::Hip,
            Architecture::new(architecture).expect("Always valid"),
            options.iter().map(|option| option.to_string()).collect(),
        )
    }

    #[test]
    fn creates_once_per_key() {
        let cache = LinkerCache::default();
        let mut created = 0;
        for _ in 0..3 {
            cache
                .get_or_insert(key("gfx90a", &[]), || {
                    created += 1;
                    Ok(LlvmBuffer::new("f", b"define void @f() {}".to_vec()))
                })
                .expect("Always valid");
        }
        assert_eq!(created, 1);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn architecture_and_options_are_part_of_the_key() {
        let cache = LinkerCache::default();
        for key in [
            key("gfx90a", &[]),
            key("gfx1100", &[]),
            key("gfx90a", &["-DN=4"]),
        ] {
            cache
                .get_or_insert(key, || Ok(LlvmBuffer::new("f", vec![])))
                .expect("Always valid");
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn failure_is_not_cached() {
        let cache = LinkerCache::default();
        cache
            .get_or_insert(key("gfx90a", &[]), || anyhow::bail!("compilation failed"))
            .expect_err("Must fail");
        assert!(cache.is_empty());

        cache.clear();
        assert_eq!(cache.misses(), 0);
    }
}

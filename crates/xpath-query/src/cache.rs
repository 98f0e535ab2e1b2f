//! Bounded cache of compiled expressions keyed by their source text.
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::compiler::compile_expression_with;
use crate::evaluator::Expression;
use crate::model::XPathNavigator;
use crate::runtime::{CompileOptions, Error};

const DEFAULT_CAPACITY: NonZeroUsize = match NonZeroUsize::new(128) {
    Some(n) => n,
    None => unreachable!(),
};

/// Shares compiled expressions between callers. Compile errors are not cached.
pub struct ExpressionCache<N: XPathNavigator> {
    entries: Mutex<LruCache<String, Arc<Expression<N>>>>,
    options: CompileOptions,
}

impl<N: XPathNavigator> Default for ExpressionCache<N> {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl<N: XPathNavigator> ExpressionCache<N> {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self::with_options(capacity, CompileOptions::default())
    }

    pub fn with_options(capacity: NonZeroUsize, options: CompileOptions) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            options,
        }
    }

    /// Returns the cached expression for `text`, compiling it on a miss.
    pub fn get_or_compile(&self, text: &str) -> Result<Arc<Expression<N>>, Error> {
        if let Some(hit) = self.lock().get(text) {
            tracing::trace!(source = text, "expression cache hit");
            return Ok(Arc::clone(hit));
        }
        tracing::trace!(source = text, "expression cache miss");
        let compiled = Arc::new(compile_expression_with(text, &self.options)?);
        self.lock().put(text.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Arc<Expression<N>>>> {
        // A panic while holding the lock cannot leave the cache inconsistent.
        self.entries.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::simple::SimpleNavigator;

    #[test]
    fn reuses_compiled_expressions() {
        let cache: ExpressionCache<SimpleNavigator> = ExpressionCache::new(NonZeroUsize::new(2).expect("capacity"));
        let a = cache.get_or_compile("count(*)").expect("compile");
        let b = cache.get_or_compile("count(*)").expect("compile");
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache: ExpressionCache<SimpleNavigator> = ExpressionCache::new(NonZeroUsize::new(2).expect("capacity"));
        let first = cache.get_or_compile("a").expect("compile");
        cache.get_or_compile("b").expect("compile");
        cache.get_or_compile("c").expect("compile");
        let again = cache.get_or_compile("a").expect("compile");
        assert!(!Arc::ptr_eq(&first, &again));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn does_not_cache_errors() {
        let cache: ExpressionCache<SimpleNavigator> = ExpressionCache::default();
        assert!(cache.get_or_compile("a[").is_err());
        assert!(cache.is_empty());
    }
}

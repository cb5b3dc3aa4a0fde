use crate::engine::ForegroundFeed;
use crate::events::ForegroundContext;
use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// SharedForeground holds the latest foreground context for the dispatch thread.
///
/// Responsibilities (strict):
/// - Cache the current foreground with cheap reads on the hot path.
/// - Skip the write lock when the detector reports the same context again.
/// - Do NOT decide anything about exclusions; that belongs to the engine.
pub struct SharedForeground {
    context_hash: AtomicU64,
    context: RwLock<Arc<ForegroundContext>>, // Arc to avoid cloning on reads
}

impl Default for SharedForeground {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedForeground {
    pub fn new() -> Self {
        Self {
            context_hash: AtomicU64::new(Self::hash_of(&ForegroundContext::unresolved())),
            context: RwLock::new(Arc::new(ForegroundContext::unresolved())),
        }
    }

    fn hash_of(context: &ForegroundContext) -> u64 {
        let mut hasher = DefaultHasher::new();
        context.hash(&mut hasher);
        hasher.finish()
    }

    #[cfg(test)]
    pub fn context_hash(&self) -> u64 {
        self.context_hash.load(Ordering::Relaxed)
    }
}

impl ForegroundFeed for SharedForeground {
    fn current(&self) -> Arc<ForegroundContext> {
        self.context.read().clone()
    }

    fn update(&self, context: ForegroundContext) -> bool {
        let new_hash = Self::hash_of(&context);
        let old_hash = self.context_hash.swap(new_hash, Ordering::Relaxed);
        if old_hash == new_hash {
            return false;
        }
        *self.context.write() = Arc::new(context);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_unresolved() {
        let feed = SharedForeground::new();
        assert!(feed.current().is_unresolved());
    }

    #[test]
    fn update_reports_changes_only() {
        let feed = SharedForeground::new();
        let reader = ForegroundContext::new("koreader", "book.epub");

        assert!(feed.update(reader.clone()));
        assert!(!feed.update(reader.clone()));
        assert_eq!(*feed.current(), reader);

        let h1 = feed.context_hash();
        assert!(feed.update(ForegroundContext::unresolved()));
        assert_ne!(h1, feed.context_hash());
        assert!(feed.current().is_unresolved());
    }
}

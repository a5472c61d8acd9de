use crate::models::{MemberView, SpecialRole, Vertical};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

pub const YEAR_OPTIONS: [&str; 5] = ["1st", "2nd", "3rd", "4th", "5th"];

/// Choices offered by the member form.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormOptions {
    pub years: Vec<&'static str>,
    pub branches: Vec<String>,
    pub verticals: Vec<&'static str>,
    pub subdomains: Vec<String>,
    pub special_roles: Vec<&'static str>,
}

impl FormOptions {
    pub fn new(branches: Vec<String>, subdomains: Vec<String>) -> Self {
        Self {
            years: YEAR_OPTIONS.to_vec(),
            branches,
            verticals: Vertical::ALL.iter().map(|v| v.as_str()).collect(),
            subdomains,
            special_roles: SpecialRole::ALL.iter().map(|r| r.as_str()).collect(),
        }
    }

    /// Used when the distinct values cannot be loaded.
    pub fn fallback() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

/// Cached dashboard reads. Any member write must call `invalidate`.
///
/// Readers take `generation()` before querying the database and hand it back
/// to `store_*`. A store whose generation is stale is dropped, so a snapshot
/// read before a write can never outlive that write's invalidation.
#[derive(Default)]
pub struct DirectoryCache {
    generation: AtomicU64,
    members: RwLock<Option<Arc<Vec<MemberView>>>>,
    options: RwLock<Option<Arc<FormOptions>>>,
}

impl DirectoryCache {
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub async fn members(&self) -> Option<Arc<Vec<MemberView>>> {
        self.members.read().await.clone()
    }

    pub async fn store_members(&self, members: Vec<MemberView>, generation: u64) -> Arc<Vec<MemberView>> {
        let members = Arc::new(members);
        let mut slot = self.members.write().await;
        if self.generation() == generation {
            *slot = Some(Arc::clone(&members));
        } else {
            tracing::debug!("Skipping stale member snapshot");
        }
        members
    }

    pub async fn options(&self) -> Option<Arc<FormOptions>> {
        self.options.read().await.clone()
    }

    pub async fn store_options(&self, options: FormOptions, generation: u64) -> Arc<FormOptions> {
        let options = Arc::new(options);
        let mut slot = self.options.write().await;
        if self.generation() == generation {
            *slot = Some(Arc::clone(&options));
        } else {
            tracing::debug!("Skipping stale form options");
        }
        options
    }

    pub async fn invalidate(&self) {
        // Bump first: a store racing with us either sees the new generation
        // or lands before the clear below.
        self.generation.fetch_add(1, Ordering::AcqRel);
        *self.members.write().await = None;
        *self.options.write().await = None;
        tracing::debug!("Directory cache invalidated");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Member;

    #[tokio::test]
    async fn test_invalidate_clears_both_views() {
        let cache = DirectoryCache::default();
        assert!(cache.members().await.is_none());

        let generation = cache.generation();
        cache.store_members(Vec::new(), generation).await;
        cache.store_options(FormOptions::new(vec!["CSE".into()], vec![]), generation).await;
        assert!(cache.members().await.is_some());
        assert_eq!(cache.options().await.unwrap().branches, vec!["CSE".to_string()]);

        cache.invalidate().await;
        assert!(cache.members().await.is_none());
        assert!(cache.options().await.is_none());
    }

    fn old_view() -> MemberView {
        let member = Member::from_sign_in("Old".into(), "old@kiit.ac.in".into(), None);
        MemberView::from(&member)
    }

    #[tokio::test]
    async fn test_store_after_invalidate_is_dropped() {
        let cache = DirectoryCache::default();

        // A reader misses and loads a snapshot while a write lands
        assert!(cache.members().await.is_none());
        let generation = cache.generation();
        cache.invalidate().await;

        let returned = cache.store_members(vec![old_view()], generation).await;
        assert_eq!(returned.len(), 1);
        assert!(cache.members().await.is_none());

        cache.store_options(FormOptions::new(vec!["CSE".into()], vec![]), generation).await;
        assert!(cache.options().await.is_none());

        // The next reader caches normally
        let fresh = cache.generation();
        cache.store_members(vec![old_view()], fresh).await;
        assert_eq!(cache.members().await.map(|m| m.len()), Some(1));
    }

    #[test]
    fn test_fallback_keeps_static_lists() {
        let options = FormOptions::fallback();
        assert_eq!(options.years.len(), 5);
        assert_eq!(options.verticals.len(), 13);
        assert_eq!(options.verticals[0], "Operations");
        assert!(options.branches.is_empty());
        assert!(options.subdomains.is_empty());
    }
}

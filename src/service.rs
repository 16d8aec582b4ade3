//! Entry points the HTTP layer and the CLI call into.
//!
//! Every call normalizes the category name, runs under the request
//! governor and talks to the store only through the injected
//! [`GraphStore`] handle.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, TraversalConfig};
use crate::error::{Result, WikidiceError};
use crate::governor::{run_with_deadline, Operation, RequestGovernor};
use crate::graph::{
    autocomplete, normalize_category_name, sample_one, traverse, GraphStore, Levels, NodeId,
};

/// A randomly drawn page and how it was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RandomPage {
    pub page_id: NodeId,
    pub title: String,
    /// 0 when the page sits directly in the requested category.
    pub depth: u32,
    /// Category titles from the requested category down to the page's parent.
    pub derivation: Vec<String>,
    /// Size of the candidate set the page was drawn from.
    pub candidates: u64,
}

#[derive(Clone)]
pub struct CategoryService {
    store: Arc<dyn GraphStore>,
    traversal: TraversalConfig,
    governor: RequestGovernor,
}

impl CategoryService {
    pub fn new(store: Arc<dyn GraphStore>, config: &Config) -> Self {
        Self {
            store,
            traversal: config.traversal.clone(),
            governor: RequestGovernor::new(config.timeouts.clone()),
        }
    }

    /// Parse a raw `levels` parameter against the configured bounds.
    pub fn levels(&self, raw: Option<&str>) -> Levels {
        Levels::parse(raw, &self.traversal)
    }

    pub fn clamp_levels(&self, requested: i64) -> Levels {
        Levels::clamped(requested, &self.traversal)
    }

    /// Check the store answers within `timeout`.
    pub async fn ping(&self, timeout: Duration) -> Result<()> {
        let store = Arc::clone(&self.store);
        run_with_deadline("ping", timeout, async move { store.ping().await }).await
    }

    /// Draw one page uniformly from the closure of `category`.
    pub async fn lookup_random_page(&self, category: &str, levels: Levels) -> Result<RandomPage> {
        let name = require_category(category)?;
        let store = Arc::clone(&self.store);

        self.governor
            .govern(Operation::Lookup, async move {
                let root = store.resolve_category(&name).await?;
                let mut rng = StdRng::from_entropy();
                let sample = sample_one(store.as_ref(), root, levels.get(), &mut rng)
                    .await?
                    .ok_or_else(|| WikidiceError::NoMembers(name.clone()))?;

                let mut ids = sample.derivation.clone();
                ids.push(sample.page.id);
                let titles = store.page_titles(&ids).await?;

                let title = titles.get(&sample.page.id).cloned().ok_or_else(|| {
                    WikidiceError::Internal(format!("page {} has no title", sample.page.id))
                })?;
                let derivation = sample
                    .derivation
                    .iter()
                    .map(|id| titles.get(id).cloned().unwrap_or_else(|| id.to_string()))
                    .collect();

                log::debug!(
                    "Picked {} from {} candidates under {} (levels={})",
                    title,
                    sample.candidates,
                    name,
                    levels.get()
                );

                Ok(RandomPage {
                    page_id: sample.page.id,
                    title,
                    depth: sample.page.depth,
                    derivation,
                    candidates: sample.candidates,
                })
            })
            .await
    }

    /// All distinct page ids in the closure of `category`.
    ///
    /// An unknown category has no members, so this returns an empty list.
    pub async fn enumerate_members(&self, category: &str, levels: Levels) -> Result<Vec<NodeId>> {
        let name = require_category(category)?;
        let store = Arc::clone(&self.store);

        self.governor
            .govern(Operation::Members, async move {
                let root = match store.resolve_category(&name).await {
                    Ok(root) => root,
                    Err(WikidiceError::CategoryNotFound(_)) => {
                        log::debug!("No category {}, returning no members", name);
                        return Ok(Vec::new());
                    }
                    Err(e) => return Err(e),
                };
                let closure = traverse(store.as_ref(), root, levels.get()).await?;
                Ok(closure.page_ids())
            })
            .await
    }

    /// Clamp a raw `limit` parameter into `[1, autocomplete_limit]`.
    ///
    /// Absent or non-numeric input means the configured limit.
    pub fn autocomplete_limit(&self, raw: Option<&str>) -> usize {
        let max = self.traversal.autocomplete_limit;
        match raw.and_then(|r| r.trim().parse::<i64>().ok()) {
            Some(n) => n.clamp(1, i64::try_from(max).unwrap_or(i64::MAX)) as usize,
            None => max,
        }
    }

    /// Up to `autocomplete_limit` category names starting with `prefix`.
    pub async fn autocomplete_category(&self, prefix: &str) -> Result<Vec<String>> {
        self.autocomplete_category_limited(prefix, self.traversal.autocomplete_limit)
            .await
    }

    /// Up to `limit` category names starting with `prefix`, never more than
    /// `autocomplete_limit`.
    pub async fn autocomplete_category_limited(
        &self,
        prefix: &str,
        limit: usize,
    ) -> Result<Vec<String>> {
        if normalize_category_name(prefix).is_empty() {
            return Ok(Vec::new());
        }
        let store = Arc::clone(&self.store);
        let prefix = prefix.to_string();
        let limit = limit.min(self.traversal.autocomplete_limit);

        self.governor
            .govern(Operation::Autocomplete, async move {
                autocomplete(store.as_ref(), &prefix, limit).await
            })
            .await
    }
}

fn require_category(category: &str) -> Result<String> {
    let name = normalize_category_name(category);
    if name.is_empty() {
        return Err(WikidiceError::InvalidInput(
            "Missing category in query string".to_string(),
        ));
    }
    Ok(name)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::TimeoutConfig;
    use crate::graph::fixtures::{dogs_graph, ids};
    use crate::graph::Edge;
    use async_trait::async_trait;
    use std::collections::{BTreeSet, HashMap};
    use std::time::Instant;

    /// A store whose every call hangs forever.
    pub(crate) struct StalledStore;

    #[async_trait]
    impl GraphStore for StalledStore {
        async fn resolve_category(&self, _name: &str) -> Result<NodeId> {
            std::future::pending().await
        }

        async fn child_edges(&self, _parent: NodeId) -> Result<Vec<Edge>> {
            std::future::pending().await
        }

        async fn search_categories(&self, _prefix: &str, _limit: usize) -> Result<Vec<String>> {
            std::future::pending().await
        }

        async fn page_titles(&self, _ids: &[NodeId]) -> Result<HashMap<NodeId, String>> {
            std::future::pending().await
        }

        async fn ping(&self) -> Result<()> {
            std::future::pending().await
        }
    }

    /// A store that is always down.
    pub(crate) struct UnavailableStore;

    #[async_trait]
    impl GraphStore for UnavailableStore {
        async fn resolve_category(&self, _name: &str) -> Result<NodeId> {
            Err(WikidiceError::StoreUnavailable("connection refused".to_string()))
        }

        async fn child_edges(&self, _parent: NodeId) -> Result<Vec<Edge>> {
            Err(WikidiceError::StoreUnavailable("connection refused".to_string()))
        }

        async fn search_categories(&self, _prefix: &str, _limit: usize) -> Result<Vec<String>> {
            Err(WikidiceError::StoreUnavailable("connection refused".to_string()))
        }

        async fn page_titles(&self, _ids: &[NodeId]) -> Result<HashMap<NodeId, String>> {
            Err(WikidiceError::StoreUnavailable("connection refused".to_string()))
        }

        async fn ping(&self) -> Result<()> {
            Err(WikidiceError::StoreUnavailable("connection refused".to_string()))
        }
    }

    pub(crate) fn short_timeouts() -> Config {
        Config {
            timeouts: TimeoutConfig {
                lookup_ms: 100,
                members_ms: 100,
                autocomplete_ms: 100,
            },
            ..Config::default()
        }
    }

    async fn dogs_service() -> (CategoryService, tempfile::TempDir) {
        let (store, temp) = dogs_graph().await;
        (CategoryService::new(Arc::new(store), &Config::default()), temp)
    }

    #[tokio::test]
    async fn test_members_example() {
        let (service, _temp) = dogs_service().await;
        let two: BTreeSet<_> = service
            .enumerate_members("Dogs", service.clamp_levels(2))
            .await
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(two, BTreeSet::from([ids::POODLE, ids::BEAGLE, ids::JACK_RUSSELL]));

        let one: BTreeSet<_> = service
            .enumerate_members("Dogs", service.clamp_levels(1))
            .await
            .unwrap()
            .into_iter()
            .collect();
        assert_eq!(one, BTreeSet::from([ids::POODLE, ids::BEAGLE]));
    }

    #[tokio::test]
    async fn test_members_have_no_duplicates() {
        let (service, _temp) = dogs_service().await;
        let members = service
            .enumerate_members("Dog breeds", service.clamp_levels(4))
            .await
            .unwrap();
        let unique: BTreeSet<_> = members.iter().copied().collect();
        assert_eq!(unique.len(), members.len());
        assert_eq!(unique, BTreeSet::from([ids::POODLE, ids::BEAGLE, ids::JACK_RUSSELL]));
    }

    #[tokio::test]
    async fn test_members_of_unknown_category_is_empty() {
        let (service, _temp) = dogs_service().await;
        let members = service
            .enumerate_members("Cats", service.levels(None))
            .await
            .unwrap();
        assert!(members.is_empty());
    }

    #[tokio::test]
    async fn test_lookup_random_page() {
        let (service, _temp) = dogs_service().await;
        let page = service
            .lookup_random_page("Dogs", service.clamp_levels(1))
            .await
            .unwrap();
        assert!(["Poodle", "Beagle"].contains(&page.title.as_str()));
        assert_eq!(page.depth, 0);
        assert_eq!(page.derivation, vec!["Dogs".to_string()]);
        assert_eq!(page.candidates, 2);
    }

    #[tokio::test]
    async fn test_lookup_unknown_category() {
        let (service, _temp) = dogs_service().await;
        let err = service
            .lookup_random_page("No such thing", service.levels(None))
            .await
            .unwrap_err();
        assert!(matches!(err, WikidiceError::CategoryNotFound(ref n) if n == "No_such_thing"));
    }

    #[tokio::test]
    async fn test_lookup_empty_category_is_not_found() {
        let (service, _temp) = dogs_service().await;
        let err = service
            .lookup_random_page("Empty category", service.levels(Some("4")))
            .await
            .unwrap_err();
        assert!(matches!(err, WikidiceError::NoMembers(_)));
        assert!(err.is_not_found());
        assert!(!err.is_store_fault());
    }

    #[tokio::test]
    async fn test_blank_category_is_invalid_input() {
        let (service, _temp) = dogs_service().await;
        let err = service
            .lookup_random_page("  ", service.levels(None))
            .await
            .unwrap_err();
        assert!(matches!(err, WikidiceError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_autocomplete_category() {
        let (service, _temp) = dogs_service().await;
        assert!(service.autocomplete_category("").await.unwrap().is_empty());
        let names = service.autocomplete_category("Dog").await.unwrap();
        assert!(names.len() <= 10);
        assert!(names.contains(&"Dogs".to_string()));
        assert!(names.iter().all(|n| n.starts_with("Dog")));
    }

    #[tokio::test]
    async fn test_autocomplete_limit_is_clamped() {
        let (service, _temp) = dogs_service().await;
        assert_eq!(service.autocomplete_limit(None), 10);
        assert_eq!(service.autocomplete_limit(Some("many")), 10);
        assert_eq!(service.autocomplete_limit(Some("3")), 3);
        assert_eq!(service.autocomplete_limit(Some("0")), 1);
        assert_eq!(service.autocomplete_limit(Some("-5")), 1);
        assert_eq!(service.autocomplete_limit(Some("500")), 10);

        let names = service.autocomplete_category_limited("Dog", 1).await.unwrap();
        assert_eq!(names.len(), 1);
        assert_eq!(service.autocomplete_category_limited("Dog", 50).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_stalled_store_hits_deadline() {
        let service = CategoryService::new(Arc::new(StalledStore), &short_timeouts());
        let start = Instant::now();

        let err = service
            .lookup_random_page("Dogs", service.levels(None))
            .await
            .unwrap_err();
        assert!(err.is_deadline_exceeded());
        let err = service
            .enumerate_members("Dogs", service.levels(None))
            .await
            .unwrap_err();
        assert!(err.is_deadline_exceeded());
        let err = service.autocomplete_category("Dog").await.unwrap_err();
        assert!(err.is_deadline_exceeded());

        // three 100ms deadlines plus scheduling slack
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_store_faults_propagate_unchanged() {
        let service = CategoryService::new(Arc::new(UnavailableStore), &Config::default());
        let err = service
            .lookup_random_page("Dogs", service.levels(None))
            .await
            .unwrap_err();
        assert!(matches!(err, WikidiceError::StoreUnavailable(_)));
        let err = service
            .enumerate_members("Dogs", service.levels(None))
            .await
            .unwrap_err();
        assert!(matches!(err, WikidiceError::StoreUnavailable(_)));
        assert!(service.ping(Duration::from_secs(1)).await.unwrap_err().is_store_fault());
    }

    #[tokio::test]
    async fn test_ping_deadline() {
        let service = CategoryService::new(Arc::new(StalledStore), &Config::default());
        let err = service.ping(Duration::from_millis(50)).await.unwrap_err();
        assert!(err.is_deadline_exceeded());
    }
}

use crate::error::Result;
use crate::graph::{normalize_category_name, GraphStore};

/// Category names starting with `prefix`, at most `limit` of them.
///
/// An empty prefix returns nothing instead of scanning every category.
pub async fn autocomplete<S>(store: &S, prefix: &str, limit: usize) -> Result<Vec<String>>
where
    S: GraphStore + ?Sized,
{
    let prefix = normalize_category_name(prefix);
    if prefix.is_empty() || limit == 0 {
        return Ok(Vec::new());
    }

    let mut names = store.search_categories(&prefix, limit).await?;
    names.retain(|name| name.starts_with(&prefix));
    names.truncate(limit);
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::fixtures::{dogs_graph, seeded_store};
    use crate::graph::CATEGORY_NAMESPACE;

    #[tokio::test]
    async fn test_empty_prefix_is_empty() {
        let (store, _temp) = dogs_graph().await;
        assert!(autocomplete(&store, "", 10).await.unwrap().is_empty());
        assert!(autocomplete(&store, "   ", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prefix_is_normalized() {
        let (store, _temp) = dogs_graph().await;
        let names = autocomplete(&store, "Dog b", 10).await.unwrap();
        assert_eq!(names, vec!["Dog_breeds".to_string()]);
    }

    #[tokio::test]
    async fn test_only_categories_match() {
        let (store, _temp) = dogs_graph().await;
        // "Poodle" is an article, not a category
        assert!(autocomplete(&store, "Poo", 10).await.unwrap().is_empty());
        assert_eq!(autocomplete(&store, "Ter", 10).await.unwrap(), vec!["Terriers".to_string()]);
    }

    #[tokio::test]
    async fn test_result_is_capped() {
        let c = CATEGORY_NAMESPACE;
        let titles: Vec<String> = (0..25).map(|i| format!("Birds_of_region_{:02}", i)).collect();
        let pages: Vec<(i64, &str, i64)> = titles
            .iter()
            .enumerate()
            .map(|(i, t)| (i as i64 + 1, t.as_str(), c))
            .collect();
        let (store, _temp) = seeded_store(&pages, &[]).await;

        let names = autocomplete(&store, "Birds of", 10).await.unwrap();
        assert_eq!(names.len(), 10);
        assert!(names.iter().all(|n| n.starts_with("Birds_of")));
        assert!(autocomplete(&store, "Birds", 0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_prefix_is_case_sensitive() {
        let (store, _temp) = dogs_graph().await;
        assert!(autocomplete(&store, "dog", 10).await.unwrap().is_empty());
    }
}

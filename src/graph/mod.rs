//! Category graph: store adapter, depth-bounded closure traversal, sampling
//! and category-name prefix search.
//!
//! The graph is read-only here. `page_cat_ids` rows are edges
//! `(child, parent, kind)`; only `subcat` edges are followed and only
//! `page` children are candidates for enumeration and sampling.

mod autocomplete;
mod levels;
mod sampler;
mod store;
mod traversal;

#[cfg(test)]
pub(crate) mod fixtures;

pub use autocomplete::autocomplete;
pub use levels::Levels;
pub use sampler::{sample_one, Sample};
pub use store::{GraphStore, SqliteGraphStore};
pub use traversal::{traverse, traverse_with, Ancestry, Closure, Member};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ValueRef};
use std::fmt;
use std::str::FromStr;

use crate::error::WikidiceError;

/// Page identifier. Categories and pages share this id space.
pub type NodeId = i64;

/// Namespace of category pages in the `page` table
pub const CATEGORY_NAMESPACE: i64 = 14;

/// Namespace of ordinary articles
pub const ARTICLE_NAMESPACE: i64 = 0;

/// What a node is, as decided by its namespace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Category,
    Page,
}

impl NodeKind {
    pub fn namespace(self) -> i64 {
        match self {
            NodeKind::Category => CATEGORY_NAMESPACE,
            NodeKind::Page => ARTICLE_NAMESPACE,
        }
    }
}

/// Kind of a category membership link (`cl_type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Child is itself a category nested under the parent
    Subcat,
    /// Child is an article filed under the parent
    Page,
    /// Media file; never expanded, never a candidate
    File,
}

impl EdgeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeKind::Subcat => "subcat",
            EdgeKind::Page => "page",
            EdgeKind::File => "file",
        }
    }
}

impl fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeKind {
    type Err = WikidiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "subcat" => Ok(EdgeKind::Subcat),
            "page" => Ok(EdgeKind::Page),
            "file" => Ok(EdgeKind::File),
            other => Err(WikidiceError::InvalidInput(format!(
                "invalid category link type: {}",
                other
            ))),
        }
    }
}

impl FromSql for EdgeKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: WikidiceError| FromSqlError::Other(Box::new(e)))
    }
}

/// A directed membership edge: `child` is filed under `parent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Edge {
    pub child: NodeId,
    pub parent: NodeId,
    pub kind: EdgeKind,
}

/// Convert a user-typed category name to the stored form (spaces become underscores).
pub fn normalize_category_name(name: &str) -> String {
    name.trim().replace(' ', "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_category_name() {
        assert_eq!(normalize_category_name("Dog breeds"), "Dog_breeds");
        assert_eq!(normalize_category_name("  Terriers "), "Terriers");
        assert_eq!(normalize_category_name("Already_clean"), "Already_clean");
        assert_eq!(normalize_category_name("   "), "");
    }

    #[test]
    fn test_edge_kind_parse() {
        assert_eq!("subcat".parse::<EdgeKind>().unwrap(), EdgeKind::Subcat);
        assert_eq!("page".parse::<EdgeKind>().unwrap(), EdgeKind::Page);
        assert_eq!("file".parse::<EdgeKind>().unwrap(), EdgeKind::File);
        assert!("Page".parse::<EdgeKind>().is_err());
        assert_eq!(EdgeKind::Subcat.to_string(), "subcat");
    }

    #[test]
    fn test_node_kind_namespace() {
        assert_eq!(NodeKind::Category.namespace(), 14);
        assert_eq!(NodeKind::Page.namespace(), 0);
    }
}

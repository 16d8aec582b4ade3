//! Depth-bounded BFS over `subcat` edges.

use std::collections::{HashMap, HashSet};

use crate::error::Result;
use crate::graph::{EdgeKind, GraphStore, NodeId};

/// One unique node discovered below the root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub id: NodeId,
    pub kind: EdgeKind,
    /// 0 for the root's direct members.
    pub depth: u32,
    /// Category the node was first discovered under.
    pub parent: NodeId,
}

/// Subcategory -> parent links recorded during a traversal.
#[derive(Debug, Clone)]
pub struct Ancestry {
    root: NodeId,
    parents: HashMap<NodeId, NodeId>,
}

impl Ancestry {
    fn new(root: NodeId) -> Self {
        Self {
            root,
            parents: HashMap::new(),
        }
    }

    /// Number of distinct subcategories discovered
    pub fn subcategories(&self) -> usize {
        self.parents.len()
    }

    /// Category chain from the root down to `category`, both ends included.
    ///
    /// Returns `None` if `category` is neither the root nor a discovered subcategory.
    pub fn chain_to(&self, category: NodeId) -> Option<Vec<NodeId>> {
        let mut chain = vec![category];
        let mut current = category;
        while current != self.root {
            current = *self.parents.get(&current)?;
            chain.push(current);
        }
        chain.reverse();
        Some(chain)
    }
}

/// Materialized depth-bounded closure of a root category.
#[derive(Debug, Clone)]
pub struct Closure {
    members: Vec<Member>,
    ancestry: Ancestry,
}

impl Closure {
    /// Every discovered member, in discovery order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    /// Page members: the enumeration and sampling candidates.
    pub fn pages(&self) -> impl Iterator<Item = &Member> + '_ {
        self.members.iter().filter(|m| m.kind == EdgeKind::Page)
    }

    pub fn page_ids(&self) -> Vec<NodeId> {
        self.pages().map(|m| m.id).collect()
    }

    pub fn page_count(&self) -> usize {
        self.pages().count()
    }

    pub fn get(&self, id: NodeId) -> Option<&Member> {
        self.members.iter().find(|m| m.id == id)
    }

    /// Category chain from the root to the category `id` was filed under.
    pub fn derivation(&self, id: NodeId) -> Option<Vec<NodeId>> {
        let member = self.get(id)?;
        self.ancestry.chain_to(member.parent)
    }
}

/// Walk the closure of `root`, calling `visit` once per unique member.
///
/// The root's direct members sit at depth 0. A subcategory found at depth
/// `d` is expanded only when `d + 1 < max_depth`, and never twice, so
/// category cycles terminate. The root itself is never visited. Returns
/// the subcategory ancestry for derivation lookups.
pub async fn traverse_with<S, F>(
    store: &S,
    root: NodeId,
    max_depth: u32,
    mut visit: F,
) -> Result<Ancestry>
where
    S: GraphStore + ?Sized,
    F: FnMut(&Member) + Send,
{
    let mut ancestry = Ancestry::new(root);
    let mut seen: HashSet<NodeId> = HashSet::new();
    seen.insert(root);

    let mut frontier = vec![root];
    let mut depth = 0;
    let mut discovered = 0usize;

    while !frontier.is_empty() && depth < max_depth {
        let edges = store.frontier_edges(&frontier).await?;
        let expand = depth + 1 < max_depth;
        let mut next = Vec::new();

        for edge in edges {
            if !seen.insert(edge.child) {
                continue;
            }
            discovered += 1;
            let member = Member {
                id: edge.child,
                kind: edge.kind,
                depth,
                parent: edge.parent,
            };
            visit(&member);

            if edge.kind == EdgeKind::Subcat {
                ancestry.parents.insert(edge.child, edge.parent);
                if expand {
                    next.push(edge.child);
                }
            }
        }

        frontier = next;
        depth += 1;
    }

    log::debug!(
        "Traversed category {} to depth {}: {} members, {} subcategories",
        root,
        max_depth,
        discovered,
        ancestry.subcategories()
    );

    Ok(ancestry)
}

/// Compute the full closure of `root` within `max_depth` levels.
pub async fn traverse<S>(store: &S, root: NodeId, max_depth: u32) -> Result<Closure>
where
    S: GraphStore + ?Sized,
{
    let mut members = Vec::new();
    let ancestry = traverse_with(store, root, max_depth, |m| members.push(*m)).await?;
    Ok(Closure { members, ancestry })
}

//! Uniform page selection over a category closure.

use rand::Rng;

use crate::error::Result;
use crate::graph::{traverse_with, EdgeKind, GraphStore, Member, NodeId};

/// A page drawn from a closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub page: Member,
    /// Categories from the root down to the one the page was found in.
    pub derivation: Vec<NodeId>,
    /// Number of distinct candidate pages the draw was made from.
    pub candidates: u64,
}

/// Pick one page uniformly at random from the closure of `root`.
///
/// Single-pass reservoir sampling: the n-th distinct page replaces the
/// current pick with probability 1/n, so every page in the deduplicated
/// candidate set is equally likely however many paths lead to it. Returns
/// `None` when the closure holds no pages.
pub async fn sample_one<S, R>(
    store: &S,
    root: NodeId,
    max_depth: u32,
    rng: &mut R,
) -> Result<Option<Sample>>
where
    S: GraphStore + ?Sized,
    R: Rng + Send,
{
    let mut candidates: u64 = 0;
    let mut picked: Option<Member> = None;

    let ancestry = traverse_with(store, root, max_depth, |member| {
        if member.kind != EdgeKind::Page {
            return;
        }
        candidates += 1;
        if rng.gen_range(0..candidates) == 0 {
            picked = Some(*member);
        }
    })
    .await?;

    Ok(picked.map(|page| Sample {
        derivation: ancestry.chain_to(page.parent).unwrap_or_else(|| vec![root]),
        page,
        candidates,
    }))
}

//! Small seeded category graphs for tests.

use rusqlite::params;
use tempfile::TempDir;

use crate::db::{migrate, Db};
use crate::error::WikidiceError;
use crate::graph::{EdgeKind, NodeId, NodeKind, SqliteGraphStore};

pub(crate) mod ids {
    use crate::graph::NodeId;

    pub const DOGS: NodeId = 1;
    pub const TERRIERS: NodeId = 2;
    pub const DOG_BREEDS: NodeId = 3;
    pub const EMPTY: NodeId = 4;
    pub const POODLE: NodeId = 100;
    pub const BEAGLE: NodeId = 101;
    pub const JACK_RUSSELL: NodeId = 102;
    pub const DOG_PHOTO: NodeId = 200;
}

const FILE_NAMESPACE: i64 = 6;

/// Create a migrated database holding exactly the given pages and links.
pub(crate) async fn seeded_store(
    pages: &[(NodeId, &str, i64)],
    links: &[(NodeId, NodeId, EdgeKind)],
) -> (SqliteGraphStore, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Db::new(temp_dir.path().join("graph.db"));
    let pages: Vec<(NodeId, String, i64)> = pages
        .iter()
        .map(|(id, title, ns)| (*id, title.to_string(), *ns))
        .collect();
    let links = links.to_vec();
    db.with_connection(move |conn| {
        migrate::run_migrations(conn)?;
        let tx = conn.transaction()?;
        for (id, title, ns) in &pages {
            tx.execute(
                "INSERT INTO page (page_id, page_title, page_namespace) VALUES (?1, ?2, ?3)",
                params![id, title, ns],
            )?;
        }
        for (child, parent, kind) in &links {
            tx.execute(
                "INSERT INTO page_cat_ids (page_id, cat_id, cl_type) VALUES (?1, ?2, ?3)",
                params![child, parent, kind.as_str()],
            )?;
        }
        tx.commit()?;
        Ok::<(), WikidiceError>(())
    })
    .await
    .unwrap();
    (SqliteGraphStore::new(db), temp_dir)
}

/// Dogs holds Poodle, Beagle, a photo and the Terriers subcategory;
/// Terriers holds Jack_Russell_Terrier and links back to Dogs.
/// Dog_breeds holds Poodle and Terriers. Empty_category holds nothing.
pub(crate) async fn dogs_graph() -> (SqliteGraphStore, TempDir) {
    let category = NodeKind::Category.namespace();
    let article = NodeKind::Page.namespace();
    seeded_store(
        &[
            (ids::DOGS, "Dogs", category),
            (ids::TERRIERS, "Terriers", category),
            (ids::DOG_BREEDS, "Dog_breeds", category),
            (ids::EMPTY, "Empty_category", category),
            (ids::POODLE, "Poodle", article),
            (ids::BEAGLE, "Beagle", article),
            (ids::JACK_RUSSELL, "Jack_Russell_Terrier", article),
            (ids::DOG_PHOTO, "Dog.jpg", FILE_NAMESPACE),
        ],
        &[
            (ids::POODLE, ids::DOGS, EdgeKind::Page),
            (ids::BEAGLE, ids::DOGS, EdgeKind::Page),
            (ids::DOG_PHOTO, ids::DOGS, EdgeKind::File),
            (ids::TERRIERS, ids::DOGS, EdgeKind::Subcat),
            (ids::JACK_RUSSELL, ids::TERRIERS, EdgeKind::Page),
            (ids::DOGS, ids::TERRIERS, EdgeKind::Subcat),
            (ids::POODLE, ids::DOG_BREEDS, EdgeKind::Page),
            (ids::TERRIERS, ids::DOG_BREEDS, EdgeKind::Subcat),
        ],
    )
    .await
}

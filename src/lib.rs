pub mod config;
pub mod error;
pub mod db;
pub mod graph;
pub mod governor;
pub mod service;
pub mod http;

pub use config::Config;
pub use error::{Result, WikidiceError};
pub use graph::{normalize_category_name, GraphStore, Levels, NodeId, SqliteGraphStore};
pub use http::HttpServer;
pub use service::{CategoryService, RandomPage};

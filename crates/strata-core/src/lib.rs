//! Strata Core - catalog query and caching engine for the StrataUI toolkit
//! catalog.
//!
//! The engine fetches toolkit listings from a PostgREST store scoped to the
//! active category and subcategory, normalizes the rows into
//! [`ToolkitRecord`]s, caches them per [`QueryKey`] with stale-while-revalidate
//! semantics and narrows them in memory by tech, language, pricing and a
//! debounced search term. It has no rendering layer; the JSON-RPC server in
//! `strata-rpc` is one consumer.
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_core::{Catalog, CatalogConfig, CatalogRoute};
//!
//! #[tokio::main]
//! async fn main() -> strata_core::Result<()> {
//!     let catalog = Catalog::connect(CatalogConfig::from_env())?;
//!
//!     let route = CatalogRoute::parse("/library/design-systems?tech=react")?;
//!     let mut session = catalog.session(route.filters());
//!
//!     let view = session.load().await;
//!     println!("{} of {} toolkits", view.data.len(), view.total);
//!
//!     // Refinements are applied to the cached list without a fetch.
//!     session.toggle_pricing("free");
//!     println!("{} free", session.view().data.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod catalog;
pub mod config;
pub mod error;
pub mod filter;
pub mod image;
pub mod models;
pub mod network;
pub mod normalize;
pub mod route;
pub mod search;
pub mod store;

// Re-export commonly used types
pub use cache::{CacheRead, CacheStats, CacheStatus, QueryCache};
pub use catalog::{Catalog, CatalogSession};
pub use config::{CachePolicy, CatalogConfig, SearchSettings, StoreSettings};
pub use error::{Result, StrataError};
pub use image::ImageResolver;
pub use models::{
    ActiveFilter, CatalogView, Category, CategoryMeta, FacetOption, Facets, FilterDimension,
    FilterState, QueryKey, SubcategoryOption, SubcategoryRef, ToolkitId, ToolkitRecord, TypeRef,
};
pub use normalize::{normalize_row, normalize_rows};
pub use route::CatalogRoute;
pub use search::DebouncedSearch;
pub use store::{CatalogStore, DynCatalogStore, InMemoryStore, PostgrestStore, StoreCall};

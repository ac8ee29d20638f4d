//! Data models for the catalog engine.
//!
//! These types are shared by every layer: the normalizer produces
//! [`ToolkitRecord`]s, sessions own a [`FilterState`], caches are keyed by
//! [`QueryKey`] and renderers consume a [`CatalogView`].

mod filters;
mod query_key;
mod taxonomy;
mod toolkit;
mod view;

pub use filters::*;
pub use query_key::*;
pub use taxonomy::*;
pub use toolkit::*;
pub use view::*;

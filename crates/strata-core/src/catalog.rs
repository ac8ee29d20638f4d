//! Catalog orchestration.
//!
//! [`Catalog`] owns the store and one [`QueryCache`] per query family and is
//! shared by every view through an `Arc`. [`CatalogSession`] is one view: it
//! owns the filter state and the debounced search, keeps the toolkit and
//! metadata caches mounted for its current [`QueryKey`], and derives the
//! visible list on demand.
//!
//! Only the category and subcategory reach the store. Tech, language, pricing
//! and search refinements are applied in memory to the cached list, so they
//! never cause a fetch.

use crate::cache::{CacheRead, CacheStats, QueryCache};
use crate::config::CatalogConfig;
use crate::error::{Result, StrataError};
use crate::filter;
use crate::image::ImageResolver;
use crate::models::{
    Category, CategoryMeta, CatalogView, Facets, FilterDimension, FilterState, QueryKey,
    SubcategoryOption, ToolkitRecord,
};
use crate::normalize::normalize_rows;
use crate::route::CatalogRoute;
use crate::search::DebouncedSearch;
use crate::store::{CatalogStore, DynCatalogStore, PostgrestStore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

/// Shared catalog engine.
pub struct Catalog {
    store: DynCatalogStore,
    config: CatalogConfig,
    toolkits: QueryCache<QueryKey, Vec<ToolkitRecord>>,
    meta: QueryCache<QueryKey, CategoryMeta>,
    categories: QueryCache<QueryKey, Vec<Category>>,
    subcategory_options: QueryCache<String, Vec<SubcategoryOption>>,
    images: ImageResolver,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("store", &self.store.name())
            .finish()
    }
}

impl Catalog {
    pub fn new(store: DynCatalogStore, config: CatalogConfig) -> Arc<Self> {
        let toolkits = {
            let store = Arc::clone(&store);
            QueryCache::new("toolkits", config.toolkits.clone(), move |key: QueryKey| {
                let store = Arc::clone(&store);
                async move {
                    let rows = store.fetch_toolkits(&key).await?;
                    Ok(normalize_rows(&rows))
                }
            })
        };
        let meta = {
            let store = Arc::clone(&store);
            QueryCache::new("category_meta", config.meta.clone(), move |key: QueryKey| {
                let store = Arc::clone(&store);
                async move { store.fetch_category_meta(&key).await }
            })
        };
        let categories = {
            let store = Arc::clone(&store);
            QueryCache::new("categories", config.categories.clone(), move |_: QueryKey| {
                let store = Arc::clone(&store);
                async move { store.fetch_categories().await }
            })
        };
        let subcategory_options = {
            let store = Arc::clone(&store);
            QueryCache::new(
                "subcategory_options",
                config.subcategory_options.clone(),
                move |category: String| {
                    let store = Arc::clone(&store);
                    async move { store.fetch_subcategory_options(&category).await }
                },
            )
        };

        info!("Catalog ready (store: {})", store.name());
        Arc::new(Self {
            images: ImageResolver::from_settings(&config.store),
            store,
            config,
            toolkits,
            meta,
            categories,
            subcategory_options,
        })
    }

    /// A catalog over the PostgREST store described by `config`.
    pub fn connect(config: CatalogConfig) -> Result<Arc<Self>> {
        let store = PostgrestStore::new(&config.store)?;
        Ok(Self::new(Arc::new(store), config))
    }

    pub fn store(&self) -> &dyn CatalogStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn toolkits(&self) -> &QueryCache<QueryKey, Vec<ToolkitRecord>> {
        &self.toolkits
    }

    pub fn meta(&self) -> &QueryCache<QueryKey, CategoryMeta> {
        &self.meta
    }

    pub fn images(&self) -> &ImageResolver {
        &self.images
    }

    /// Toolkits for the scope of `key`, from cache when available.
    pub async fn list_toolkits(&self, key: &QueryKey) -> Result<Arc<Vec<ToolkitRecord>>> {
        self.toolkits.get(key).await
    }

    /// Display names for `key`. Unscoped keys have no metadata and never
    /// touch the cache.
    pub async fn category_meta(&self, key: &QueryKey) -> Result<Arc<CategoryMeta>> {
        if !key.is_scoped() {
            return Ok(Arc::new(CategoryMeta::default()));
        }
        self.meta.get(key).await
    }

    pub async fn categories(&self) -> Result<Arc<Vec<Category>>> {
        self.categories.get(&QueryKey::all()).await
    }

    /// Subcategories of `category` with counts. No category, no fetch.
    pub async fn subcategory_options(
        &self,
        category: Option<&str>,
    ) -> Result<Arc<Vec<SubcategoryOption>>> {
        match category.map(str::trim).filter(|c| !c.is_empty()) {
            Some(category) => self.subcategory_options.get(&category.to_string()).await,
            None => Ok(Arc::new(Vec::new())),
        }
    }

    /// One-shot view of `filters`, applying its search term as is.
    pub async fn query(&self, filters: &FilterState) -> Result<CatalogView> {
        let key = filters.query_key();
        let (toolkits, meta) = futures::join!(self.list_toolkits(&key), self.category_meta(&key));
        let toolkits = toolkits?;
        let meta = meta?;

        let term = filters.search_term().trim().to_string();
        let updated_at = self.toolkits.peek(&key).updated_at;
        Ok(CatalogView {
            total: toolkits.len(),
            facets: Arc::new(filter::facets(&toolkits)),
            data: Arc::new(filter::apply(&toolkits, filters, &term)),
            query_key: key,
            category_meta: (*meta).clone(),
            search_term: term,
            active_filters: filters.active_filters(),
            is_loading: false,
            is_fetching: false,
            is_error: false,
            updated_at,
            error: None,
            toolkits_error: None,
            meta_error: None,
        })
    }

    /// Open a view on `filters`. Its search term becomes the committed term.
    pub fn session(self: &Arc<Self>, filters: FilterState) -> CatalogSession {
        CatalogSession::new(Arc::clone(self), filters)
    }

    pub fn cache_stats(&self) -> Vec<CacheStats> {
        vec![
            self.toolkits.stats(),
            self.meta.stats(),
            self.categories.stats(),
            self.subcategory_options.stats(),
        ]
    }

    pub fn clear_caches(&self) {
        self.toolkits.clear();
        self.meta.clear();
        self.categories.clear();
        self.subcategory_options.clear();
    }
}

fn drain(updates: &mut broadcast::Receiver<QueryKey>) {
    loop {
        match updates.try_recv() {
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
}

/// Inputs the visible list was last computed from.
struct Memo {
    source: Option<Arc<Vec<ToolkitRecord>>>,
    refinements: FilterState,
    term: String,
    data: Arc<Vec<ToolkitRecord>>,
    facets: Arc<Facets>,
}

/// Per-view catalog state.
pub struct CatalogSession {
    catalog: Arc<Catalog>,
    filters: FilterState,
    key: QueryKey,
    search: DebouncedSearch,
    memo: Mutex<Option<Memo>>,
    recomputes: AtomicU64,
    toolkit_updates: broadcast::Receiver<QueryKey>,
    meta_updates: broadcast::Receiver<QueryKey>,
    search_updates: watch::Receiver<String>,
}

impl std::fmt::Debug for CatalogSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogSession")
            .field("key", &self.key)
            .field("filters", &self.filters)
            .finish()
    }
}

impl CatalogSession {
    fn new(catalog: Arc<Catalog>, filters: FilterState) -> Self {
        let mut search = DebouncedSearch::new(&catalog.config.search);
        search.reset(filters.search_term());
        let session = Self {
            key: filters.query_key(),
            toolkit_updates: catalog.toolkits.subscribe(),
            meta_updates: catalog.meta.subscribe(),
            search_updates: search.subscribe(),
            search,
            filters,
            memo: Mutex::new(None),
            recomputes: AtomicU64::new(0),
            catalog,
        };
        session.mount();
        session
    }

    /// Open a view on a catalog URL.
    pub fn from_route(catalog: &Arc<Catalog>, route: &CatalogRoute) -> Self {
        catalog.session(route.filters())
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn query_key(&self) -> &QueryKey {
        &self.key
    }

    pub fn search(&self) -> &DebouncedSearch {
        &self.search
    }

    /// The URL of the current state.
    pub fn route(&self) -> CatalogRoute {
        CatalogRoute::from_filters(&self.filters, &self.search.committed())
    }

    /// How many times the visible list has been recomputed.
    pub fn recompute_count(&self) -> u64 {
        self.recomputes.load(Ordering::SeqCst)
    }

    // Filter mutations. Each returns true if the state changed.

    pub fn set_category(&mut self, category: Option<&str>) -> bool {
        let changed = self.filters.set_category(category);
        self.sync_key();
        changed
    }

    pub fn set_subcategory(&mut self, subcategory: Option<&str>) -> bool {
        let changed = self.filters.set_subcategory(subcategory);
        self.sync_key();
        changed
    }

    pub fn set_tech<I, S>(&mut self, tech: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.filters.set_tech(tech)
    }

    pub fn toggle_tech(&mut self, tech: &str) -> bool {
        self.filters.toggle_tech(tech)
    }

    pub fn set_languages<I, S>(&mut self, languages: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.filters.set_languages(languages)
    }

    pub fn toggle_language(&mut self, language: &str) -> bool {
        self.filters.toggle_language(language)
    }

    pub fn set_pricing<I, S>(&mut self, pricing: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.filters.set_pricing(pricing)
    }

    pub fn toggle_pricing(&mut self, pricing: &str) -> bool {
        self.filters.toggle_pricing(pricing)
    }

    /// A keystroke in the search box. Filtering picks it up after the
    /// debounce quiet period.
    pub fn set_search(&mut self, input: &str) -> bool {
        self.search.set(input);
        self.filters.set_search_term(self.search.raw())
    }

    /// Submit the search box: commit the raw input now.
    pub fn flush_search(&mut self) -> bool {
        self.search.flush()
    }

    pub fn remove_filter(&mut self, dimension: FilterDimension, value: &str) -> bool {
        let changed = self.filters.remove(dimension, value);
        if dimension == FilterDimension::Search && changed {
            self.search.reset("");
        }
        self.sync_key();
        changed
    }

    /// Clear tech, language, pricing and search, keeping the scope.
    pub fn clear_refinements(&mut self) -> bool {
        let changed = self.filters.clear_refinements();
        self.search.reset("");
        changed
    }

    /// Replace the whole state, e.g. after navigating to another URL. A
    /// pending search commit is dropped; the route's term is committed.
    pub fn navigate(&mut self, route: &CatalogRoute) {
        self.filters = route.filters();
        self.search.reset(self.filters.search_term());
        debug!("Session navigated to {}", route.to_path());
        self.sync_key();
    }

    // Refetching. Fetches start immediately and keep running if the caller
    // does not wait for them; `load` waits.

    /// Force both the toolkit list and the metadata of the current scope.
    pub fn refetch_all(&self) {
        self.refetch_toolkits();
        self.refetch_meta();
    }

    pub fn refetch_toolkits(&self) {
        let _ = self.catalog.toolkits.refetch(&self.key);
    }

    pub fn refetch_meta(&self) {
        if self.key.is_scoped() {
            let _ = self.catalog.meta.refetch(&self.key);
        }
    }

    /// Wait for the current scope's running fetches, then build the view.
    pub async fn load(&self) -> CatalogView {
        if self.key.is_scoped() {
            futures::join!(
                self.catalog.toolkits.settle(&self.key),
                self.catalog.meta.settle(&self.key)
            );
        } else {
            self.catalog.toolkits.settle(&self.key).await;
        }
        self.view()
    }

    /// Wait until something the view depends on changes: a cache update for
    /// the current scope or a search commit.
    pub async fn changed(&mut self) {
        let key = self.key.clone();
        let is_current = |update: std::result::Result<QueryKey, broadcast::error::RecvError>| {
            match update {
                Ok(updated) => updated == key,
                // Lagged: something was missed, assume it was ours.
                Err(broadcast::error::RecvError::Lagged(_)) => true,
                Err(broadcast::error::RecvError::Closed) => false,
            }
        };
        loop {
            tokio::select! {
                update = self.toolkit_updates.recv() => {
                    if is_current(update) {
                        return;
                    }
                }
                update = self.meta_updates.recv() => {
                    if is_current(update) {
                        return;
                    }
                }
                _ = self.search_updates.changed() => return,
            }
        }
    }

    /// Drop pending change notifications, so the next [`changed`](Self::changed)
    /// waits for something newer than the view about to be built.
    pub fn mark_seen(&mut self) {
        drain(&mut self.toolkit_updates);
        drain(&mut self.meta_updates);
        self.search_updates.borrow_and_update();
    }

    /// Current view. Serves cached data immediately (starting a background
    /// refresh if it went stale) and only refilters when the cached list,
    /// the refinements or the committed search term changed.
    pub fn view(&self) -> CatalogView {
        let toolkits = self.catalog.toolkits.ensure(&self.key);
        let meta = if self.key.is_scoped() {
            self.catalog.meta.ensure(&self.key)
        } else {
            CacheRead::absent()
        };
        let term = self.search.committed();
        let (data, facets) = self.visible(toolkits.data.as_ref(), &term);

        let toolkits_error = toolkits.error.clone();
        let meta_error = meta.error.clone();
        let error: Option<StrataError> = toolkits_error.clone().or_else(|| meta_error.clone());

        CatalogView {
            query_key: self.key.clone(),
            total: toolkits.data.as_ref().map_or(0, |d| d.len()),
            data,
            facets,
            category_meta: meta.data.as_deref().cloned().unwrap_or_default(),
            search_term: term,
            active_filters: self.filters.active_filters(),
            is_loading: toolkits.is_loading() || meta.is_loading(),
            is_fetching: toolkits.is_fetching || meta.is_fetching,
            is_error: error.is_some(),
            updated_at: toolkits.updated_at,
            error,
            toolkits_error,
            meta_error,
        }
    }

    // Internal methods

    fn mount(&self) {
        self.catalog.toolkits.mount(&self.key);
        if self.key.is_scoped() {
            self.catalog.meta.mount(&self.key);
        }
    }

    fn sync_key(&mut self) {
        let key = self.filters.query_key();
        if key != self.key {
            debug!("Session scope {} -> {}", self.key, key);
            self.key = key;
            self.mount();
        }
    }

    /// Filtered list and facets for `source`. Facets only depend on the
    /// source list, so they survive refinement and search changes.
    fn visible(
        &self,
        source: Option<&Arc<Vec<ToolkitRecord>>>,
        term: &str,
    ) -> (Arc<Vec<ToolkitRecord>>, Arc<Facets>) {
        let refinements = self.filters.clone().with_search_term("");
        let mut memo = self.memo.lock().unwrap_or_else(PoisonError::into_inner);

        let mut facets = None;
        if let Some(memo) = memo.as_ref() {
            let same_source = match (&memo.source, source) {
                (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                (None, None) => true,
                _ => false,
            };
            if same_source {
                if memo.refinements == refinements && memo.term == term {
                    return (Arc::clone(&memo.data), Arc::clone(&memo.facets));
                }
                facets = Some(Arc::clone(&memo.facets));
            }
        }

        let facets = facets.unwrap_or_else(|| {
            Arc::new(source.map_or_else(Facets::default, |records| filter::facets(records)))
        });
        let data = Arc::new(match source {
            Some(records) => filter::apply(records, &refinements, term),
            None => Vec::new(),
        });
        self.recomputes.fetch_add(1, Ordering::SeqCst);
        *memo = Some(Memo {
            source: source.cloned(),
            refinements,
            term: term.to_string(),
            data: Arc::clone(&data),
            facets: Arc::clone(&facets),
        });
        (data, facets)
    }
}

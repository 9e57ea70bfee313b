//! Incremental, single-flight page loading.
//!
//! A [`Loader`] owns the rows a grid or list has fetched so far together
//! with the paging cursor that produced them. It never performs I/O itself:
//! [`Loader::load_next_page`] returns a [`Command`] that the runtime executes,
//! and the resulting [`PageLoaded`] message is handed back through
//! [`Loader::apply`]. At most one fetch is in flight at any time.
//!
//! Each [`reset`](Loader::reset) starts a new *epoch*. A result that was
//! requested before the reset carries the old epoch and is dropped on
//! arrival, so a slow response can never leak rows from a previous query
//! into the new one.

use crate::record::Record;
use crate::selection::Selection;
use crate::source::{DataSource, FetchError, FetchResult, PageRequest};
use grist_core::Command;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Rows requested per page when nothing else is configured.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Whether the view owning a loader is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MountState {
    /// Attached, but no page has been merged yet.
    #[default]
    Pending,
    /// At least one page has been merged.
    Mounted,
    /// The view is gone; late results are discarded.
    Unmounted,
}

/// Initial configuration of a [`Loader`].
///
/// ```rust,ignore
/// let config = LoaderConfig::default()
///     .with_batch_size(100)
///     .with_order_by("name", true)
///     .with_query(serde_json::json!({ "active": true }));
/// ```
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Rows per page (default: 50, never less than 1).
    pub batch_size: usize,
    /// Fetch the first page as soon as the view is attached (default: true).
    pub auto_load: bool,
    /// Sort field forwarded to the data source.
    pub order_by: Option<String>,
    /// Sort direction forwarded to the data source.
    pub order_by_asc: Option<bool>,
    /// Opaque filter payload forwarded to the data source.
    pub query: Option<Value>,
    /// Distance from the end of the loaded rows that triggers the next
    /// fetch. `None` means half a batch.
    pub prefetch_threshold: Option<usize>,
    /// Clear the in-flight flag when a fetch fails, so the next scroll
    /// retries (default: true). When false a failure leaves the loader
    /// stuck until [`Loader::reset`].
    pub release_on_error: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            auto_load: true,
            order_by: None,
            order_by_asc: None,
            query: None,
            prefetch_threshold: None,
            release_on_error: true,
        }
    }
}

impl LoaderConfig {
    /// Set the page size.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Enable or disable the first-page fetch on attach.
    pub fn with_auto_load(mut self, auto_load: bool) -> Self {
        self.auto_load = auto_load;
        self
    }

    /// Set the sort field and direction.
    pub fn with_order_by(mut self, field: impl Into<String>, ascending: bool) -> Self {
        self.order_by = Some(field.into());
        self.order_by_asc = Some(ascending);
        self
    }

    /// Set the query payload.
    pub fn with_query(mut self, query: Value) -> Self {
        self.query = Some(query);
        self
    }

    /// Set an explicit prefetch threshold.
    pub fn with_prefetch_threshold(mut self, threshold: usize) -> Self {
        self.prefetch_threshold = Some(threshold);
        self
    }

    /// Choose whether a failed fetch releases the in-flight flag.
    pub fn with_release_on_error(mut self, release: bool) -> Self {
        self.release_on_error = release;
        self
    }
}

/// The full state of a loader: paging cursor, loaded rows, and selection.
///
/// Read it through the accessors; rows change only through [`Loader`] and
/// the [`SelectionController`](crate::selection::SelectionController).
#[derive(Debug, Clone)]
pub struct LoaderState<T: Record> {
    pub(crate) auto_load: bool,
    pub(crate) current_page: usize,
    pub(crate) batch_size: usize,
    pub(crate) order_by: Option<String>,
    pub(crate) order_by_asc: Option<bool>,
    pub(crate) query: Option<Value>,
    pub(crate) has_next_page: bool,
    pub(crate) is_loading: bool,
    pub(crate) mount: MountState,
    pub(crate) last_loaded_count: Option<usize>,
    pub(crate) loaded_items: usize,
    pub(crate) rows: Vec<T>,
    pub(crate) id_cache: HashSet<T::Key>,
    pub(crate) selection: Selection<T>,
    pub(crate) epoch: u64,
    // Rows at the end of `rows` that the most recent fetch contributed.
    pub(crate) tail_len: Option<usize>,
    // Rows were handed in by the host; the first page is not auto-fetched.
    pub(crate) seeded: bool,
}

impl<T: Record> LoaderState<T> {
    fn from_config(config: &LoaderConfig) -> Self {
        Self {
            auto_load: config.auto_load,
            current_page: 0,
            batch_size: config.batch_size.max(1),
            order_by: config.order_by.clone(),
            order_by_asc: config.order_by_asc,
            query: config.query.clone(),
            has_next_page: true,
            is_loading: false,
            mount: MountState::Pending,
            last_loaded_count: None,
            loaded_items: 0,
            rows: Vec::new(),
            id_cache: HashSet::new(),
            selection: Selection::default(),
            epoch: 0,
            tail_len: None,
            seeded: false,
        }
    }

    pub fn auto_load(&self) -> bool {
        self.auto_load
    }

    /// The next page index to request.
    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn order_by(&self) -> Option<&str> {
        self.order_by.as_deref()
    }

    pub fn order_by_asc(&self) -> Option<bool> {
        self.order_by_asc
    }

    pub fn query(&self) -> Option<&Value> {
        self.query.as_ref()
    }

    pub fn has_next_page(&self) -> bool {
        self.has_next_page
    }

    /// Whether a fetch is in flight.
    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn mount(&self) -> MountState {
        self.mount
    }

    /// Size of the most recent fetch result, before deduplication.
    pub fn last_loaded_count(&self) -> Option<usize> {
        self.last_loaded_count
    }

    pub fn loaded_items(&self) -> usize {
        self.loaded_items
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    /// Whether a row with this key has been loaded.
    pub fn contains_key(&self, key: &T::Key) -> bool {
        self.id_cache.contains(key)
    }

    pub fn selection(&self) -> &Selection<T> {
        &self.selection
    }

    pub fn selected_items(&self) -> &[T] {
        self.selection.items()
    }

    /// Current reset generation.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Number of slots a view should render: every loaded row, plus one
    /// trailing placeholder while more pages exist.
    pub fn item_count(&self) -> usize {
        self.rows.len() + usize::from(self.has_next_page)
    }

    /// Whether `index` is the trailing placeholder slot.
    pub fn is_placeholder(&self, index: usize) -> bool {
        self.has_next_page && index == self.rows.len()
    }

    fn request(&self, page_increment: usize) -> PageRequest {
        // A refresh re-fetches the page that produced the current tail.
        let page = if page_increment == 0 {
            self.current_page.saturating_sub(1)
        } else {
            self.current_page
        };
        PageRequest {
            page,
            batch_size: self.batch_size,
            order_by: self.order_by.clone(),
            order_by_asc: self.order_by_asc,
            query: self.query.clone(),
        }
    }

    fn tail_start(&self) -> usize {
        self.rows.len() - self.tail_len.unwrap_or(0).min(self.rows.len())
    }

    fn seed(&mut self, rows: Vec<T>) {
        self.seeded = !rows.is_empty();
        self.rows = rows;
        self.id_cache = self.rows.iter().map(Record::key).collect();
        self.loaded_items = self.rows.len();
    }

    /// Splice `item` in at `index` (clamped to the end). Returns the index
    /// it landed at.
    pub(crate) fn insert_row(&mut self, index: usize, item: T) -> usize {
        let index = index.min(self.rows.len());
        let tail_start = self.tail_start();
        if let Some(tail) = self.tail_len.as_mut() {
            if *tail > 0 && index >= tail_start {
                *tail += 1;
            }
        }
        self.id_cache.insert(item.key());
        self.rows.insert(index, item);
        self.loaded_items = self.rows.len();
        index
    }

    /// Remove the row at `index`, if there is one.
    pub(crate) fn remove_row(&mut self, index: usize) -> Option<T> {
        if index >= self.rows.len() {
            return None;
        }
        let tail_start = self.tail_start();
        let row = self.rows.remove(index);
        if index >= tail_start {
            if let Some(tail) = self.tail_len.as_mut() {
                *tail = tail.saturating_sub(1);
            }
        }
        let key = row.key();
        if !self.rows.iter().any(|r| r.key() == key) {
            self.id_cache.remove(&key);
        }
        self.loaded_items = self.rows.len();
        Some(row)
    }

    fn append(&mut self, rows: Vec<T>) -> usize {
        let mut added = 0;
        for row in rows {
            if self.id_cache.insert(row.key()) {
                self.rows.push(row);
                added += 1;
            }
        }
        self.tail_len = Some(added);
        added
    }

    fn replace_tail(&mut self, rows: Vec<T>) -> usize {
        let replaced = match self.tail_len {
            Some(tail) => tail.min(self.rows.len()),
            None => self.rows.len(),
        };
        let keep = self.rows.len() - replaced;
        self.rows.truncate(keep);
        self.id_cache = self.rows.iter().map(Record::key).collect();
        self.append(rows);
        replaced
    }
}

/// Overrides applied by [`Loader::reset`].
///
/// Fields left unset keep their current value, except the paging cursor
/// which always restarts at page 0 with more pages assumed, and auto-load
/// which is switched back on.
///
/// ```rust,ignore
/// grid.reset(Reset::new().query(json!({ "city": "Lyon" })));
/// grid.reset(Reset::new().with_rows(cached).has_next_page(false));
/// ```
#[derive(Debug, Clone)]
pub struct Reset<T> {
    auto_load: Option<bool>,
    current_page: Option<usize>,
    batch_size: Option<usize>,
    order_by: Option<Option<String>>,
    order_by_asc: Option<Option<bool>>,
    query: Option<Option<Value>>,
    has_next_page: Option<bool>,
    rows: Vec<T>,
}

impl<T> Default for Reset<T> {
    fn default() -> Self {
        Self {
            auto_load: None,
            current_page: None,
            batch_size: None,
            order_by: None,
            order_by_asc: None,
            query: None,
            has_next_page: None,
            rows: Vec::new(),
        }
    }
}

impl<T> Reset<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn auto_load(mut self, auto_load: bool) -> Self {
        self.auto_load = Some(auto_load);
        self
    }

    /// Start from a page other than 0.
    pub fn page(mut self, page: usize) -> Self {
        self.current_page = Some(page);
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Sort by `field`. The direction keeps its current value unless
    /// [`order_by_asc`](Self::order_by_asc) is also given.
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order_by = Some(Some(field.into()));
        self
    }

    pub fn order_by_asc(mut self, ascending: bool) -> Self {
        self.order_by_asc = Some(Some(ascending));
        self
    }

    pub fn clear_order_by(mut self) -> Self {
        self.order_by = Some(None);
        self.order_by_asc = Some(None);
        self
    }

    pub fn query(mut self, query: Value) -> Self {
        self.query = Some(Some(query));
        self
    }

    pub fn clear_query(mut self) -> Self {
        self.query = Some(None);
        self
    }

    pub fn has_next_page(mut self, has_next_page: bool) -> Self {
        self.has_next_page = Some(has_next_page);
        self
    }

    /// Seed the reset loader with rows the host already has. Seeded rows
    /// suppress the automatic first-page fetch.
    pub fn with_rows(mut self, rows: Vec<T>) -> Self {
        self.rows = rows;
        self
    }
}

/// The result of one fetch, delivered back to [`Loader::apply`].
#[derive(Debug)]
pub struct PageLoaded<T> {
    /// Epoch the request was issued in.
    pub epoch: u64,
    /// Pages the cursor advances by on merge; 0 for an in-place refresh.
    pub page_increment: usize,
    pub result: FetchResult<T>,
}

/// What [`Loader::apply`] did with a [`PageLoaded`] message.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// A page was appended. `added` excludes duplicates.
    Appended { fetched: usize, added: usize },
    /// The tail was replaced by a re-fetched page.
    Refreshed { fetched: usize, replaced: usize },
    /// The source had nothing to merge.
    Empty,
    /// The result predates the latest reset.
    Stale,
    /// The loader was detached before the result arrived.
    Detached,
    /// The fetch failed.
    Failed(Arc<FetchError>),
}

impl LoadOutcome {
    /// Whether the rows changed.
    pub fn merged(&self) -> bool {
        matches!(self, Self::Appended { .. } | Self::Refreshed { .. })
    }
}

/// Callback invoked after every merge with the new rows and state.
pub type UpdateRowsFn<T> = Box<dyn FnMut(&[T], &LoaderState<T>) + Send>;

/// Coordinates page fetches for one view.
///
/// # Example
///
/// ```rust,ignore
/// let mut loader = Loader::new(source, LoaderConfig::default());
/// let cmd = loader.attach().map(Message::Loaded); // first page
///
/// // later, in update():
/// Message::Loaded(page) => {
///     loader.apply(page);
///     loader.maybe_prefetch(last_visible_row).map(Message::Loaded)
/// }
/// ```
pub struct Loader<T: Record> {
    state: LoaderState<T>,
    source: Arc<dyn DataSource<T>>,
    prefetch_threshold: Option<usize>,
    release_on_error: bool,
    on_update_rows: Option<UpdateRowsFn<T>>,
}

impl<T: Record> Loader<T> {
    pub fn new(source: impl DataSource<T>, config: LoaderConfig) -> Self {
        Self::from_shared(Arc::new(source), config)
    }

    /// Create a loader over a source shared with other views.
    pub fn from_shared(source: Arc<dyn DataSource<T>>, config: LoaderConfig) -> Self {
        Self {
            state: LoaderState::from_config(&config),
            source,
            prefetch_threshold: config.prefetch_threshold,
            release_on_error: config.release_on_error,
            on_update_rows: None,
        }
    }

    /// Start with rows the host already has instead of fetching page 0.
    pub fn with_rows(mut self, rows: Vec<T>) -> Self {
        self.state.seed(rows);
        self
    }

    /// Set the callback invoked after every merge.
    pub fn on_update_rows(
        mut self,
        callback: impl FnMut(&[T], &LoaderState<T>) + Send + 'static,
    ) -> Self {
        self.on_update_rows = Some(Box::new(callback));
        self
    }

    pub fn state(&self) -> &LoaderState<T> {
        &self.state
    }

    pub(crate) fn state_mut(&mut self) -> &mut LoaderState<T> {
        &mut self.state
    }

    pub fn rows(&self) -> &[T] {
        &self.state.rows
    }

    pub fn item_count(&self) -> usize {
        self.state.item_count()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading
    }

    /// Rows from the end of the loaded set at which the next page is
    /// requested.
    pub fn prefetch_threshold(&self) -> usize {
        self.prefetch_threshold
            .unwrap_or(self.state.batch_size / 2)
    }

    /// Bind the loader to a live view and run the auto-load check.
    ///
    /// Coming back from a detach starts a new epoch, so a fetch issued before
    /// the detach no longer holds the in-flight slot.
    pub fn attach(&mut self) -> Command<PageLoaded<T>> {
        if self.state.mount == MountState::Unmounted {
            self.state.mount = MountState::Pending;
            self.state.epoch = self.state.epoch.wrapping_add(1);
            self.state.is_loading = false;
        }
        debug!(epoch = self.state.epoch, "loader attached");
        self.auto_load()
    }

    /// Mark the view as gone. Results arriving afterwards are discarded.
    pub fn detach(&mut self) {
        self.state.mount = MountState::Unmounted;
        debug!(epoch = self.state.epoch, "loader detached");
    }

    /// Fetch the first page if auto-load is on and nothing was loaded or
    /// seeded yet.
    pub fn auto_load(&mut self) -> Command<PageLoaded<T>> {
        let state = &self.state;
        if state.auto_load
            && state.current_page == 0
            && !state.seeded
            && state.mount != MountState::Unmounted
        {
            self.load_next_page()
        } else {
            Command::none()
        }
    }

    /// Request the page after the last loaded one.
    pub fn load_next_page(&mut self) -> Command<PageLoaded<T>> {
        self.load_pages(1)
    }

    /// Re-fetch the most recent page and replace the rows it contributed.
    pub fn refresh_current_page(&mut self) -> Command<PageLoaded<T>> {
        self.load_pages(0)
    }

    /// Issue a fetch that advances the cursor by `page_increment` on merge
    /// (0 refreshes in place). No-op while a fetch is in flight or once the
    /// end of the data was reached.
    pub fn load_pages(&mut self, page_increment: usize) -> Command<PageLoaded<T>> {
        if !self.state.has_next_page || self.state.is_loading {
            trace!(
                has_next_page = self.state.has_next_page,
                is_loading = self.state.is_loading,
                "load skipped"
            );
            return Command::none();
        }

        self.state.is_loading = true;
        let request = self.state.request(page_increment);
        let last_item = self.state.rows.last().cloned();
        let epoch = self.state.epoch;
        debug!(
            page = request.page,
            batch_size = request.batch_size,
            page_increment,
            epoch,
            "requesting page"
        );

        let fetch = self.source.load(request, last_item);
        Command::perform(fetch, move |result| PageLoaded {
            epoch,
            page_increment,
            result,
        })
    }

    /// Request the next page when the last visible row is within the
    /// prefetch threshold of the end of the loaded rows.
    pub fn maybe_prefetch(&mut self, visible_stop_index: usize) -> Command<PageLoaded<T>> {
        let loaded = self.state.rows.len();
        if loaded > 0 && visible_stop_index.saturating_add(self.prefetch_threshold()) >= loaded {
            self.load_next_page()
        } else {
            Command::none()
        }
    }

    /// Merge a fetch result into the state.
    pub fn apply(&mut self, msg: PageLoaded<T>) -> LoadOutcome {
        let PageLoaded {
            epoch,
            page_increment,
            result,
        } = msg;

        if epoch != self.state.epoch {
            debug!(epoch, current = self.state.epoch, "discarding result from a previous epoch");
            return LoadOutcome::Stale;
        }
        if self.state.mount == MountState::Unmounted {
            debug!(epoch, "discarding result for a detached loader");
            return LoadOutcome::Detached;
        }

        let rows = match result {
            Ok(Some(rows)) => rows,
            Ok(None) => {
                self.state.is_loading = false;
                trace!(epoch, "source returned nothing to merge");
                return LoadOutcome::Empty;
            }
            Err(err) => {
                warn!(error = %err, epoch, page = self.state.current_page, "page fetch failed");
                if self.release_on_error {
                    self.state.is_loading = false;
                }
                return LoadOutcome::Failed(Arc::new(err));
            }
        };

        let state = &mut self.state;
        let fetched = rows.len();
        state.mount = MountState::Mounted;
        state.last_loaded_count = Some(fetched);
        state.has_next_page = fetched >= state.batch_size;
        state.is_loading = false;

        let outcome = if page_increment == 0 {
            let replaced = state.replace_tail(rows);
            LoadOutcome::Refreshed { fetched, replaced }
        } else {
            state.current_page += page_increment;
            let added = state.append(rows);
            LoadOutcome::Appended { fetched, added }
        };
        state.loaded_items = state.rows.len();

        debug!(
            fetched,
            total = state.rows.len(),
            has_next_page = state.has_next_page,
            page = state.current_page,
            "page merged"
        );

        if let Some(callback) = self.on_update_rows.as_mut() {
            callback(&self.state.rows, &self.state);
        }
        outcome
    }

    /// Discard loaded rows and restart paging from the overrides.
    ///
    /// Rows are only replaced while the view is attached. Any fetch still in
    /// flight belongs to the previous epoch and will be ignored. The
    /// returned command is the auto-load fetch, if one is due.
    pub fn reset(&mut self, overrides: Reset<T>) -> Command<PageLoaded<T>> {
        let Reset {
            auto_load,
            current_page,
            batch_size,
            order_by,
            order_by_asc,
            query,
            has_next_page,
            rows,
        } = overrides;

        let state = &mut self.state;
        state.epoch = state.epoch.wrapping_add(1);
        state.current_page = current_page.unwrap_or(0);
        state.has_next_page = has_next_page.unwrap_or(true);
        state.is_loading = false;
        state.last_loaded_count = None;
        state.tail_len = None;
        state.auto_load = auto_load.unwrap_or(true);
        if let Some(batch_size) = batch_size {
            state.batch_size = batch_size.max(1);
        }
        if let Some(order_by) = order_by {
            state.order_by = order_by;
        }
        if let Some(order_by_asc) = order_by_asc {
            state.order_by_asc = order_by_asc;
        }
        if let Some(query) = query {
            state.query = query;
        }
        if state.mount != MountState::Unmounted {
            state.seed(rows);
        }
        state.loaded_items = state.rows.len();

        debug!(
            epoch = state.epoch,
            page = state.current_page,
            seeded = state.seeded,
            "loader reset"
        );
        self.auto_load()
    }
}

impl<T: Record> fmt::Debug for Loader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Loader")
            .field("state", &self.state)
            .field("prefetch_threshold", &self.prefetch_threshold())
            .field("release_on_error", &self.release_on_error)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::fixtures::{rows, Row};
    use grist_core::testing::Effects;
    use std::sync::Mutex;

    /// A source that answers page `n` with `pages[n]`, or an empty page.
    fn scripted(pages: Vec<Vec<Row>>) -> impl DataSource<Row> {
        let pages = Arc::new(pages);
        move |req: PageRequest, _last: Option<Row>| {
            let page = pages.get(req.page).cloned().unwrap_or_default();
            async move { Ok::<_, FetchError>(Some(page)) }
        }
    }

    fn loader(pages: Vec<Vec<Row>>, batch_size: usize) -> Loader<Row> {
        Loader::new(
            scripted(pages),
            LoaderConfig::default().with_batch_size(batch_size),
        )
    }

    async fn resolve(cmd: Command<PageLoaded<Row>>) -> PageLoaded<Row> {
        Effects::of(cmd)
            .resolve_next()
            .await
            .expect("a fetch was issued")
    }

    fn ids(loader: &Loader<Row>) -> Vec<u32> {
        loader.rows().iter().map(|r| r.id).collect()
    }

    #[test]
    fn default_config() {
        let config = LoaderConfig::default();
        assert_eq!(config.batch_size, 50);
        assert!(config.auto_load);
        assert!(config.release_on_error);
        assert!(config.prefetch_threshold.is_none());
    }

    #[test]
    fn initial_state() {
        let loader = loader(vec![], 10);
        let state = loader.state();
        assert_eq!(state.current_page(), 0);
        assert!(state.has_next_page());
        assert!(!state.is_loading());
        assert_eq!(state.mount(), MountState::Pending);
        assert_eq!(state.last_loaded_count(), None);
        assert_eq!(loader.item_count(), 1);
        assert!(state.is_placeholder(0));
        assert_eq!(loader.prefetch_threshold(), 5);
    }

    #[tokio::test]
    async fn attach_loads_first_page() {
        let mut loader = loader(vec![rows(0..3)], 3);
        let cmd = loader.attach();
        assert!(cmd.is_async());
        assert!(loader.is_loading());

        let outcome = loader.apply(resolve(cmd).await);
        assert!(matches!(outcome, LoadOutcome::Appended { fetched: 3, added: 3 }));
        let state = loader.state();
        assert_eq!(state.mount(), MountState::Mounted);
        assert_eq!(state.current_page(), 1);
        assert_eq!(state.loaded_items(), 3);
        assert_eq!(state.last_loaded_count(), Some(3));
        assert!(state.has_next_page());
        assert!(!state.is_loading());
        assert_eq!(loader.item_count(), 4);
    }

    #[test]
    fn attach_without_auto_load_does_nothing() {
        let mut loader = Loader::new(
            scripted(vec![]),
            LoaderConfig::default().with_auto_load(false),
        );
        assert!(loader.attach().is_none());
        assert!(!loader.is_loading());
    }

    #[test]
    fn seeded_rows_suppress_auto_load() {
        let mut loader = loader(vec![], 10).with_rows(rows(0..4));
        assert!(loader.attach().is_none());
        assert_eq!(loader.state().loaded_items(), 4);
        assert!(loader.state().contains_key(&2));
    }

    #[test]
    fn only_one_fetch_in_flight() {
        let mut loader = loader(vec![rows(0..3)], 3);
        let first = loader.load_next_page();
        assert!(first.is_async());
        assert!(loader.load_next_page().is_none());
        assert!(loader.refresh_current_page().is_none());
        assert!(loader.maybe_prefetch(100).is_none());
    }

    #[tokio::test]
    async fn short_page_marks_end_of_data() {
        let mut loader = loader(vec![rows(0..3), rows(3..5)], 3);
        let msg = resolve(loader.load_next_page()).await;
        loader.apply(msg);
        let msg = resolve(loader.load_next_page()).await;
        loader.apply(msg);

        assert_eq!(ids(&loader), vec![0, 1, 2, 3, 4]);
        assert!(!loader.state().has_next_page());
        assert_eq!(loader.item_count(), 5);
        assert!(loader.load_next_page().is_none());
        assert!(!loader.is_loading());
    }

    #[tokio::test]
    async fn empty_page_marks_end_of_data() {
        let mut loader = loader(vec![rows(0..2)], 2);
        let msg = resolve(loader.load_next_page()).await;
        loader.apply(msg);
        let msg = resolve(loader.load_next_page()).await;
        let outcome = loader.apply(msg);

        assert!(matches!(outcome, LoadOutcome::Appended { fetched: 0, added: 0 }));
        assert!(!loader.state().has_next_page());
        assert_eq!(loader.state().current_page(), 2);
    }

    #[tokio::test]
    async fn duplicate_keys_keep_first_seen() {
        let page0 = vec![Row::named(1, "first"), Row::named(2, "b"), Row::named(3, "c")];
        let page1 = vec![Row::named(3, "second"), Row::named(4, "d"), Row::named(5, "e")];
        let mut loader = loader(vec![page0, page1], 3);

        let msg = resolve(loader.load_next_page()).await;
        loader.apply(msg);
        let msg = resolve(loader.load_next_page()).await;
        let outcome = loader.apply(msg);

        assert!(matches!(outcome, LoadOutcome::Appended { fetched: 3, added: 2 }));
        assert_eq!(ids(&loader), vec![1, 2, 3, 4, 5]);
        assert_eq!(loader.rows()[2].name, "c");
        assert_eq!(loader.state().last_loaded_count(), Some(3));
        assert!(loader.state().has_next_page());
    }

    #[tokio::test]
    async fn refresh_replaces_only_the_last_page() {
        let refreshed = vec![Row::named(3, "fresh"), Row::named(9, "new")];
        let mut loader = loader(vec![rows(0..3), refreshed], 3);
        let msg = resolve(loader.load_next_page()).await;
        loader.apply(msg);
        loader.state_mut().insert_row(3, Row::new(3));
        loader.state_mut().insert_row(4, Row::new(4));
        // Pretend the last fetch contributed the final two rows.
        loader.state_mut().tail_len = Some(2);
        loader.state_mut().current_page = 2;
        assert_eq!(ids(&loader), vec![0, 1, 2, 3, 4]);

        let cmd = loader.refresh_current_page();
        let msg = resolve(cmd).await;
        assert_eq!(msg.page_increment, 0);
        let outcome = loader.apply(msg);

        assert!(matches!(outcome, LoadOutcome::Refreshed { fetched: 2, replaced: 2 }));
        assert_eq!(ids(&loader), vec![0, 1, 2, 3, 9]);
        assert_eq!(loader.rows()[3].name, "fresh");
        assert_eq!(loader.state().current_page(), 2);
        assert!(!loader.state().contains_key(&4));
        assert_eq!(loader.state().loaded_items(), 5);
    }

    #[tokio::test]
    async fn refresh_requests_the_page_behind_the_cursor() {
        let requested = Arc::new(Mutex::new(Vec::new()));
        let log = requested.clone();
        let source = move |req: PageRequest, _last: Option<Row>| {
            log.lock().unwrap().push(req.page);
            let start = (req.page * 2) as u32;
            async move { Ok::<_, FetchError>(Some(rows(start..start + 2))) }
        };
        let mut loader = Loader::new(source, LoaderConfig::default().with_batch_size(2));

        for _ in 0..2 {
            let msg = resolve(loader.load_next_page()).await;
            loader.apply(msg);
        }
        let msg = resolve(loader.refresh_current_page()).await;
        loader.apply(msg);

        assert_eq!(*requested.lock().unwrap(), vec![0, 1, 1]);
        assert_eq!(ids(&loader), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn refresh_without_history_replaces_everything() {
        let mut loader = loader(vec![rows(7..9)], 2).with_rows(rows(0..5));
        let msg = resolve(loader.refresh_current_page()).await;
        let outcome = loader.apply(msg);
        assert!(matches!(outcome, LoadOutcome::Refreshed { replaced: 5, .. }));
        assert_eq!(ids(&loader), vec![7, 8]);
    }

    #[tokio::test]
    async fn results_after_detach_are_discarded() {
        let updates = Arc::new(Mutex::new(0));
        let counter = updates.clone();
        let mut loader = loader(vec![rows(0..3)], 3).on_update_rows(move |_, _| {
            *counter.lock().unwrap() += 1;
        });

        let cmd = loader.attach();
        loader.detach();
        let outcome = loader.apply(resolve(cmd).await);

        assert!(matches!(outcome, LoadOutcome::Detached));
        assert!(loader.rows().is_empty());
        assert_eq!(loader.state().mount(), MountState::Unmounted);
        assert_eq!(*updates.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn stale_results_are_discarded_after_reset() {
        let mut loader = loader(vec![rows(0..3)], 3);
        let stale = loader.attach();

        let fresh = loader.reset(Reset::new().query(serde_json::json!({ "q": "x" })));
        assert!(fresh.is_async(), "reset re-runs auto-load");

        let outcome = loader.apply(resolve(stale).await);
        assert!(matches!(outcome, LoadOutcome::Stale));
        assert!(loader.rows().is_empty());
        assert!(loader.is_loading(), "the fresh fetch is still in flight");

        let outcome = loader.apply(resolve(fresh).await);
        assert!(outcome.merged());
        assert_eq!(ids(&loader), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn reset_restores_defaults() {
        let mut loader = loader(vec![rows(0..3), rows(3..6)], 3);
        for _ in 0..2 {
            let msg = resolve(loader.load_next_page()).await;
            loader.apply(msg);
        }
        let _ = loader.load_next_page();
        assert!(loader.is_loading());

        let cmd = loader.reset(Reset::new().auto_load(false));
        assert!(cmd.is_none());
        let state = loader.state();
        assert!(state.rows().is_empty());
        assert_eq!(state.current_page(), 0);
        assert_eq!(state.loaded_items(), 0);
        assert!(state.has_next_page());
        assert!(!state.is_loading());
        assert_eq!(state.last_loaded_count(), None);
        assert!(!state.contains_key(&0));
        assert_eq!(state.epoch(), 1);
    }

    #[test]
    fn reset_applies_overrides() {
        let mut loader = loader(vec![], 10);
        let cmd = loader.reset(
            Reset::new()
                .page(4)
                .batch_size(25)
                .order_by("name")
                .order_by_asc(false)
                .query(serde_json::json!({ "city": "Oslo" })),
        );
        assert!(cmd.is_none(), "auto-load only fires from page 0");
        let state = loader.state();
        assert_eq!(state.current_page(), 4);
        assert_eq!(state.batch_size(), 25);
        assert_eq!(state.order_by(), Some("name"));
        assert_eq!(state.order_by_asc(), Some(false));
        assert_eq!(state.query().map(|q| q["city"].clone()), Some("Oslo".into()));

        loader.reset(Reset::new().clear_order_by().clear_query().auto_load(false));
        assert_eq!(loader.state().order_by(), None);
        assert_eq!(loader.state().query(), None);
        assert_eq!(loader.state().batch_size(), 25);
    }

    #[test]
    fn reset_keeps_sort_direction_when_only_field_changes() {
        let mut loader = Loader::new(
            scripted(vec![]),
            LoaderConfig::default().with_order_by("id", false),
        );
        loader.reset(Reset::new().order_by("name").auto_load(false));
        assert_eq!(loader.state().order_by(), Some("name"));
        assert_eq!(loader.state().order_by_asc(), Some(false));

        loader.reset(Reset::new().order_by_asc(true).auto_load(false));
        assert_eq!(loader.state().order_by(), Some("name"));
        assert_eq!(loader.state().order_by_asc(), Some(true));
    }

    #[tokio::test]
    async fn reattach_after_late_result_fetches_again() {
        let mut loader = loader(vec![rows(0..3), rows(0..3)], 3);
        let first = loader.attach();
        assert!(first.is_async());
        loader.detach();
        let outcome = loader.apply(resolve(first).await);
        assert!(matches!(outcome, LoadOutcome::Detached));

        let again = loader.attach();
        assert!(again.is_async(), "re-attach issues the first-page fetch");
        let outcome = loader.apply(resolve(again).await);
        assert!(outcome.merged());
        assert_eq!(ids(&loader), vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn result_in_flight_across_reattach_is_stale() {
        let mut loader = loader(vec![rows(0..3), rows(3..6)], 3);
        let before = loader.attach();
        loader.detach();
        let after = loader.attach();
        assert!(after.is_async());

        assert!(matches!(loader.apply(resolve(before).await), LoadOutcome::Stale));
        assert!(loader.rows().is_empty());
        assert!(loader.apply(resolve(after).await).merged());
        assert_eq!(loader.rows().len(), 3);
    }

    #[test]
    fn prefetch_threshold_saturates() {
        let mut loader = Loader::new(
            scripted(vec![]),
            LoaderConfig::default()
                .with_auto_load(false)
                .with_prefetch_threshold(usize::MAX),
        );
        loader.reset(Reset::new().with_rows(rows(0..3)).auto_load(false));
        assert!(loader.maybe_prefetch(2).is_async());
    }

    #[test]
    fn reset_turns_auto_load_back_on() {
        let mut loader = Loader::new(
            scripted(vec![rows(0..5)]),
            LoaderConfig::default().with_auto_load(false),
        );
        assert!(loader.attach().is_none());
        let cmd = loader.reset(Reset::new());
        assert!(loader.state().auto_load());
        assert!(cmd.is_async());
    }

    #[test]
    fn reset_with_rows_seeds_without_fetching() {
        let mut loader = loader(vec![], 10);
        let cmd = loader.reset(Reset::new().with_rows(rows(0..3)).has_next_page(false));
        assert!(cmd.is_none());
        assert_eq!(ids(&loader), vec![0, 1, 2]);
        assert_eq!(loader.item_count(), 3);
    }

    #[test]
    fn reset_keeps_rows_while_detached() {
        let mut loader = loader(vec![], 10).with_rows(rows(0..2));
        loader.detach();
        let cmd = loader.reset(Reset::new().with_rows(rows(5..6)));
        assert!(cmd.is_none());
        assert_eq!(ids(&loader), vec![0, 1]);
        assert_eq!(loader.state().current_page(), 0);
    }

    #[tokio::test]
    async fn failure_releases_the_guard_by_default() {
        let source = |_req: PageRequest, _last: Option<Row>| async {
            Err::<Option<Vec<Row>>, _>(FetchError::message("offline"))
        };
        let mut loader = Loader::new(source, LoaderConfig::default());
        let cmd = loader.load_next_page();
        let outcome = loader.apply(resolve(cmd).await);

        match outcome {
            LoadOutcome::Failed(err) => assert_eq!(err.to_string(), "offline"),
            other => panic!("expected failure, got {other:?}"),
        }
        assert!(!loader.is_loading());
        assert!(loader.rows().is_empty());
        assert!(loader.load_next_page().is_async(), "retry is possible");
    }

    #[tokio::test]
    async fn failure_can_keep_the_guard() {
        let source = |_req: PageRequest, _last: Option<Row>| async {
            Err::<Option<Vec<Row>>, _>(FetchError::message("offline"))
        };
        let mut loader = Loader::new(source, LoaderConfig::default().with_release_on_error(false));
        let cmd = loader.load_next_page();
        loader.apply(resolve(cmd).await);
        assert!(loader.is_loading());
        assert!(loader.load_next_page().is_none());

        loader.reset(Reset::new().auto_load(false));
        assert!(!loader.is_loading());
    }

    #[tokio::test]
    async fn no_update_releases_the_guard() {
        let source =
            |_req: PageRequest, _last: Option<Row>| async { Ok::<Option<Vec<Row>>, FetchError>(None) };
        let mut loader = Loader::new(source, LoaderConfig::default());
        let cmd = loader.load_next_page();
        let outcome = loader.apply(resolve(cmd).await);
        assert!(matches!(outcome, LoadOutcome::Empty));
        assert!(!loader.is_loading());
        assert!(loader.state().has_next_page());
        assert_eq!(loader.state().mount(), MountState::Pending);
    }

    #[tokio::test]
    async fn last_item_is_forwarded() {
        let seen = Arc::new(Mutex::new(None));
        let log = seen.clone();
        let source = move |_req: PageRequest, last: Option<Row>| {
            *log.lock().unwrap() = last.map(|r| r.id);
            async { Ok::<_, FetchError>(Some(Vec::<Row>::new())) }
        };
        let mut loader = Loader::new(source, LoaderConfig::default()).with_rows(rows(0..3));
        let cmd = loader.load_next_page();
        loader.apply(resolve(cmd).await);
        assert_eq!(*seen.lock().unwrap(), Some(2));
    }

    #[tokio::test]
    async fn update_callback_sees_merged_rows() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let log = seen.clone();
        let mut loader = loader(vec![rows(0..2)], 2).on_update_rows(move |rows, state| {
            log.lock().unwrap().push((rows.len(), state.current_page()));
        });
        let cmd = loader.attach();
        loader.apply(resolve(cmd).await);
        assert_eq!(*seen.lock().unwrap(), vec![(2, 1)]);
    }

    #[tokio::test]
    async fn prefetch_honours_threshold() {
        let mut loader = loader(vec![rows(0..10)], 10);
        assert!(loader.maybe_prefetch(0).is_none(), "nothing loaded yet");

        let cmd = loader.attach();
        loader.apply(resolve(cmd).await);
        assert_eq!(loader.prefetch_threshold(), 5);

        assert!(loader.maybe_prefetch(4).is_none());
        assert!(loader.maybe_prefetch(5).is_async());
    }

    #[tokio::test]
    async fn explicit_prefetch_threshold() {
        let mut loader = Loader::new(
            scripted(vec![rows(0..10)]),
            LoaderConfig::default()
                .with_batch_size(10)
                .with_prefetch_threshold(1),
        );
        let cmd = loader.attach();
        loader.apply(resolve(cmd).await);
        assert!(loader.maybe_prefetch(7).is_none());
        assert!(loader.maybe_prefetch(9).is_async());
    }

    #[test]
    fn insert_and_remove_keep_cache_in_sync() {
        let mut loader = loader(vec![], 10).with_rows(rows(0..3));
        let state = loader.state_mut();
        assert_eq!(state.insert_row(99, Row::new(7)), 3);
        assert!(state.contains_key(&7));
        assert_eq!(state.loaded_items(), 4);

        assert_eq!(state.remove_row(0).map(|r| r.id), Some(0));
        assert!(!state.contains_key(&0));
        assert!(state.remove_row(10).is_none());
        assert_eq!(state.loaded_items(), 3);
    }

    #[test]
    fn remove_keeps_key_shared_by_another_row() {
        let mut loader = loader(vec![], 10).with_rows(vec![Row::new(1), Row::new(1)]);
        let state = loader.state_mut();
        state.remove_row(0);
        assert!(state.contains_key(&1));
        state.remove_row(0);
        assert!(!state.contains_key(&1));
    }
}

//! Application orchestration layer for Shelfview.

use catalog::CatalogError;
use shelfview_core::{AutoSelect, Book, PageWindow, Settings, Shelf, filter_books};
use tracing::{debug, info, warn};

mod loader;

pub use loader::{Fetched, Loader, load_once};

/// Which shelf is selected, plus the auto-select edge.
///
/// Auto-selection is the explicit transition `Unselected -> Selected(first)`
/// taken when a non-empty shelf list is observed while armed. Any selection
/// disarms it; [`SelectionState::clear`] re-arms it only under
/// [`AutoSelect::Rearm`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionState {
    selected: Option<String>,
    policy: AutoSelect,
    armed: bool,
}

impl SelectionState {
    pub fn new(policy: AutoSelect) -> Self {
        Self {
            selected: None,
            policy,
            armed: true,
        }
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_selected(&self, shelf_id: &str) -> bool {
        self.selected.as_deref() == Some(shelf_id)
    }

    pub fn select(&mut self, shelf_id: impl Into<String>) {
        self.selected = Some(shelf_id.into());
        self.armed = false;
    }

    pub fn clear(&mut self) {
        self.selected = None;
        self.armed = self.policy == AutoSelect::Rearm;
    }

    /// Takes the auto-select edge if it applies and returns the new selection.
    pub fn observe_shelves(&mut self, shelves: &[Shelf]) -> Option<&str> {
        if self.selected.is_some() || !self.armed {
            return None;
        }
        let first = shelves.first()?;
        self.select(first.id.clone());
        self.selected.as_deref()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShelvesState {
    Idle,
    Loading,
    Ready(Vec<Shelf>),
    Failed(CatalogError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum BooksState {
    /// Nothing selected yet.
    Idle,
    Loading { shelf_id: String },
    Ready { shelf_id: String, books: Vec<Book> },
    Failed { shelf_id: String, error: CatalogError },
}

/// Tag carried by an in-flight book load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub shelf_id: String,
    pub generation: u64,
}

#[derive(Debug, Clone)]
pub struct AppContext {
    pub settings: Settings,
    shelves: ShelvesState,
    selection: SelectionState,
    books: BooksState,
    generation: u64,
    query: String,
    filtered: Vec<Book>,
    window: PageWindow,
}

impl AppContext {
    pub fn new(settings: Settings) -> Self {
        let selection = SelectionState::new(settings.auto_select);
        Self {
            settings,
            shelves: ShelvesState::Idle,
            selection,
            books: BooksState::Idle,
            generation: 0,
            query: String::new(),
            filtered: Vec::new(),
            window: PageWindow::default(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.set_query(query);
        self
    }

    pub fn shelves_state(&self) -> &ShelvesState {
        &self.shelves
    }

    pub fn shelves(&self) -> &[Shelf] {
        match &self.shelves {
            ShelvesState::Ready(shelves) => shelves,
            _ => &[],
        }
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn selected_shelf_id(&self) -> Option<&str> {
        self.selection.selected()
    }

    pub fn selected_shelf(&self) -> Option<&Shelf> {
        let id = self.selection.selected()?;
        self.shelves().iter().find(|shelf| shelf.id == id)
    }

    pub fn books_state(&self) -> &BooksState {
        &self.books
    }

    /// Books of the selected shelf before filtering.
    pub fn books(&self) -> &[Book] {
        match &self.books {
            BooksState::Ready { books, .. } => books,
            _ => &[],
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn filtered_books(&self) -> &[Book] {
        &self.filtered
    }

    pub fn visible_books(&self) -> &[Book] {
        self.window.page(&self.filtered)
    }

    pub fn page_window(&self) -> PageWindow {
        self.window
    }

    pub fn current_page(&self) -> usize {
        self.window.current_page()
    }

    pub fn total_pages(&self) -> usize {
        self.window.total_pages(self.filtered.len())
    }

    /// Marks the shelf list as loading. Returns `false` when a load is
    /// already in flight, so only one shelf list response is ever pending.
    pub fn begin_shelves_load(&mut self) -> bool {
        if matches!(self.shelves, ShelvesState::Loading) {
            return false;
        }
        self.shelves = ShelvesState::Loading;
        true
    }

    /// Stores the shelf list and, when the auto-select edge fires, returns
    /// the book load to start.
    pub fn apply_shelves(
        &mut self,
        result: Result<Vec<Shelf>, CatalogError>,
    ) -> Option<LoadTicket> {
        match result {
            Ok(shelves) => {
                info!(count = shelves.len(), "shelves loaded");
                let auto = self.selection.observe_shelves(&shelves).map(str::to_string);
                self.shelves = ShelvesState::Ready(shelves);
                let shelf_id = auto?;
                info!(shelf_id = %shelf_id, "auto-selected first shelf");
                Some(self.begin_books_load(shelf_id))
            }
            Err(err) => {
                warn!(error = %err, "failed to load shelves");
                self.shelves = ShelvesState::Failed(err);
                None
            }
        }
    }

    /// Selects `shelf_id` and returns the book load to start. Selecting the
    /// current shelf again reloads it.
    pub fn select(&mut self, shelf_id: impl Into<String>) -> LoadTicket {
        let shelf_id = shelf_id.into();
        info!(shelf_id = %shelf_id, "shelf selected");
        self.selection.select(shelf_id.clone());
        self.begin_books_load(shelf_id)
    }

    /// Drops the selection and any in-flight load. Under
    /// [`AutoSelect::Rearm`] the first shelf is picked again right away.
    pub fn clear_selection(&mut self) -> Option<LoadTicket> {
        self.selection.clear();
        self.generation += 1;
        self.books = BooksState::Idle;
        self.recompute();

        let shelf_id = match &self.shelves {
            ShelvesState::Ready(shelves) => {
                self.selection.observe_shelves(shelves).map(str::to_string)
            }
            _ => None,
        }?;
        info!(shelf_id = %shelf_id, "auto-selected first shelf");
        Some(self.begin_books_load(shelf_id))
    }

    pub fn reload_books(&mut self) -> Option<LoadTicket> {
        let shelf_id = self.selection.selected()?.to_string();
        Some(self.begin_books_load(shelf_id))
    }

    fn begin_books_load(&mut self, shelf_id: String) -> LoadTicket {
        self.generation += 1;
        self.books = BooksState::Loading {
            shelf_id: shelf_id.clone(),
        };
        self.recompute();
        LoadTicket {
            shelf_id,
            generation: self.generation,
        }
    }

    /// Applies a finished book load unless a newer load or another selection
    /// superseded it. Returns whether the result was applied.
    pub fn apply_books(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<Book>, CatalogError>,
    ) -> bool {
        if ticket.generation != self.generation || !self.selection.is_selected(&ticket.shelf_id) {
            debug!(
                shelf_id = %ticket.shelf_id,
                generation = ticket.generation,
                current = self.generation,
                "discarding stale book load"
            );
            return false;
        }

        let LoadTicket { shelf_id, .. } = ticket;
        self.books = match result {
            Ok(books) => {
                info!(shelf_id = %shelf_id, count = books.len(), "shelf books loaded");
                BooksState::Ready { shelf_id, books }
            }
            Err(err) => {
                warn!(shelf_id = %shelf_id, error = %err, "failed to load shelf books");
                BooksState::Failed {
                    shelf_id,
                    error: err,
                }
            }
        };
        self.recompute();
        true
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
        self.recompute();
    }

    pub fn push_query_char(&mut self, ch: char) {
        self.query.push(ch);
        self.recompute();
    }

    pub fn pop_query_char(&mut self) {
        self.query.pop();
        self.recompute();
    }

    pub fn next_page(&mut self) -> bool {
        self.window.next(self.filtered.len())
    }

    pub fn prev_page(&mut self) -> bool {
        self.window.prev()
    }

    pub fn go_to_page(&mut self, page: usize) {
        self.window.go_to(page, self.filtered.len());
    }

    pub fn is_loading_books(&self) -> bool {
        matches!(self.books, BooksState::Loading { .. })
    }

    /// Rebuilds the filtered view and keeps the page inside it. The page is
    /// left alone while a load is in flight and clamped once it lands.
    fn recompute(&mut self) {
        self.filtered = filter_books(self.books(), &self.query);
        if !self.is_loading_books() {
            self.window.clamp(self.filtered.len());
        }
    }
}

//! Runs catalog requests off the UI thread and hands the results back.

use std::sync::Arc;

use catalog::{Catalog, CatalogError, resolve_shelf_books};
use shelfview_core::{Book, Shelf};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::{AppContext, LoadTicket};

/// A finished request, ready to be applied to an [`AppContext`].
#[derive(Debug, Clone)]
pub enum Fetched {
    Shelves(Result<Vec<Shelf>, CatalogError>),
    Books(LoadTicket, Result<Vec<Book>, CatalogError>),
}

impl AppContext {
    /// Applies a finished request; may return a follow-up book load.
    pub fn apply(&mut self, fetched: Fetched) -> Option<LoadTicket> {
        match fetched {
            Fetched::Shelves(result) => self.apply_shelves(result),
            Fetched::Books(ticket, result) => {
                self.apply_books(ticket, result);
                None
            }
        }
    }
}

pub struct Loader<C> {
    catalog: Arc<C>,
    runtime: Handle,
    tx: UnboundedSender<Fetched>,
}

impl<C: Catalog + 'static> Loader<C> {
    pub fn new(catalog: Arc<C>, runtime: Handle) -> (Self, UnboundedReceiver<Fetched>) {
        let (tx, rx) = unbounded_channel();
        let loader = Self {
            catalog,
            runtime,
            tx,
        };
        (loader, rx)
    }

    pub fn load_shelves(&self) {
        let catalog = Arc::clone(&self.catalog);
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let result = catalog.list_shelves().await;
            // The receiver is gone only when the UI has shut down.
            let _ = tx.send(Fetched::Shelves(result));
        });
    }

    pub fn load_books(&self, ticket: LoadTicket) {
        let catalog = Arc::clone(&self.catalog);
        let tx = self.tx.clone();
        self.runtime.spawn(async move {
            let result = resolve_shelf_books(catalog.as_ref(), &ticket.shelf_id).await;
            let _ = tx.send(Fetched::Books(ticket, result));
        });
    }
}

/// Loads shelves and the selected shelf's books in place, without a UI.
///
/// A shelf selected beforehand suppresses the auto-select edge.
pub async fn load_once<C: Catalog>(ctx: &mut AppContext, catalog: &C) {
    ctx.begin_shelves_load();
    let ticket = ctx.apply_shelves(catalog.list_shelves().await);
    let ticket = ticket.or_else(|| ctx.reload_books());
    if let Some(ticket) = ticket {
        let result = resolve_shelf_books(catalog, &ticket.shelf_id).await;
        ctx.apply_books(ticket, result);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use shelfview_core::Settings;
    use shelfview_test::{FakeCatalog, make_book, make_shelf};

    use super::*;
    use crate::BooksState;

    fn catalog() -> FakeCatalog {
        FakeCatalog::default()
            .with_shelves(vec![make_shelf("s1"), make_shelf("s2")])
            .with_shelf_members("s1", &["f1", "f2", "f3"])
            .with_shelf_members("s2", &["g1"])
            .with_book(make_book("f1", "The Hobbit", &["J.R.R. Tolkien"]))
            .with_failing_book("f2")
            .with_book(make_book("f3", "Dune", &["Frank Herbert"]))
            .with_book(make_book("g1", "Good Omens", &["Neil Gaiman"]))
    }

    fn ids(books: &[Book]) -> Vec<&str> {
        books.iter().map(|b| b.id.as_str()).collect()
    }

    #[tokio::test]
    async fn load_once_auto_selects_and_resolves() {
        let mut ctx = AppContext::new(Settings::default());
        load_once(&mut ctx, &catalog()).await;

        assert_eq!(ctx.selected_shelf_id(), Some("s1"));
        assert_eq!(ids(ctx.books()), vec!["f1", "f3"]);
    }

    #[tokio::test]
    async fn load_once_keeps_preselected_shelf() {
        let mut ctx = AppContext::new(Settings::default());
        ctx.select("s2");
        load_once(&mut ctx, &catalog()).await;

        assert_eq!(ctx.selected_shelf_id(), Some("s2"));
        assert_eq!(ids(ctx.books()), vec!["g1"]);
    }

    #[tokio::test]
    async fn load_once_reports_shape_error() {
        let catalog = catalog().with_malformed_shelf("s1");
        let mut ctx = AppContext::new(Settings::default());
        load_once(&mut ctx, &catalog).await;

        assert!(matches!(
            ctx.books_state(),
            BooksState::Failed {
                error: CatalogError::Shape { .. },
                ..
            }
        ));
    }

    #[test]
    fn loader_discards_slow_stale_load() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let catalog = catalog().with_delay("f1", Duration::from_millis(200));
        let (loader, mut rx) = Loader::new(Arc::new(catalog), runtime.handle().clone());

        let mut ctx = AppContext::new(Settings::default());
        ctx.begin_shelves_load();
        loader.load_shelves();
        let fetched = rx.blocking_recv().unwrap();
        let first = ctx.apply(fetched).unwrap();
        assert_eq!(first.shelf_id, "s1");
        loader.load_books(first);

        let second = ctx.select("s2");
        loader.load_books(second);

        // s2 resolves first; s1 arrives late and must not overwrite it.
        for _ in 0..2 {
            let fetched = rx.blocking_recv().unwrap();
            assert_eq!(ctx.apply(fetched), None);
        }
        assert_eq!(ctx.selected_shelf_id(), Some("s2"));
        assert_eq!(ids(ctx.books()), vec!["g1"]);
    }
}

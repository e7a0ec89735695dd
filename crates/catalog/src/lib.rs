//! Remote catalog access: the HTTP client and the shelf fan-out resolver.

use std::future::Future;

use futures::future::join_all;
use shelfview_core::{Book, Shelf};
use thiserror::Error;
use tracing::{debug, warn};

mod http;

pub use http::HttpCatalog;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("book list of shelf {shelf_id} is {found}, expected an array")]
    Shape { shelf_id: String, found: &'static str },
}

/// Read-only view of the catalog service.
pub trait Catalog: Send + Sync {
    fn list_shelves(&self) -> impl Future<Output = Result<Vec<Shelf>, CatalogError>> + Send;

    fn list_shelf_book_ids(
        &self,
        shelf_id: &str,
    ) -> impl Future<Output = Result<Vec<String>, CatalogError>> + Send;

    fn get_book(&self, book_id: &str) -> impl Future<Output = Result<Book, CatalogError>> + Send;
}

/// Resolves every book of `shelf_id`.
///
/// The membership list is all-or-nothing. Detail lookups then run together
/// and each one succeeds or fails on its own: failed ids are dropped and the
/// surviving books keep the membership order.
pub async fn resolve_shelf_books<C: Catalog>(
    catalog: &C,
    shelf_id: &str,
) -> Result<Vec<Book>, CatalogError> {
    let ids = catalog.list_shelf_book_ids(shelf_id).await?;
    let slots = join_all(ids.iter().map(|id| catalog.get_book(id))).await;

    let mut books = Vec::with_capacity(slots.len());
    for (id, slot) in ids.iter().zip(slots) {
        match slot {
            Ok(book) => books.push(book),
            Err(err) => warn!(shelf_id, book_id = %id, error = %err, "dropping unresolved book"),
        }
    }

    debug!(
        shelf_id,
        requested = ids.len(),
        resolved = books.len(),
        "resolved shelf books"
    );
    Ok(books)
}

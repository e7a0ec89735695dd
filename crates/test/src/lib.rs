//! Test helpers and fixtures.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use catalog::{Catalog, CatalogError};
use shelfview_core::{Author, Book, Shelf};

pub fn make_shelf(id: &str) -> Shelf {
    Shelf {
        id: id.to_string(),
        title: format!("Shelf {id}"),
        slug: format!("shelf-{id}"),
    }
}

pub fn make_book(id: &str, title: &str, authors: &[&str]) -> Book {
    Book {
        id: id.to_string(),
        title: title.to_string(),
        image: format!("https://img.test/{id}.jpg"),
        authors: authors
            .iter()
            .map(|name| Author {
                name: name.to_string(),
            })
            .collect(),
        price: None,
        rating: None,
    }
}

/// One book per id, titled `Book {id}`.
pub fn make_books(ids: &[&str]) -> Vec<Book> {
    ids.iter()
        .map(|id| make_book(id, &format!("Book {id}"), &["Anon"]))
        .collect()
}

pub fn transport_error(url: &str) -> CatalogError {
    CatalogError::Transport {
        url: url.to_string(),
        message: "connection refused".to_string(),
    }
}

/// In-memory [`Catalog`] with scripted failures and delays.
#[derive(Debug, Default, Clone)]
pub struct FakeCatalog {
    shelves: Vec<Shelf>,
    fail_shelves: bool,
    members: HashMap<String, Vec<String>>,
    malformed_shelves: HashSet<String>,
    books: HashMap<String, Book>,
    failing_books: HashSet<String>,
    delays: HashMap<String, Duration>,
}

impl FakeCatalog {
    pub fn with_shelves(mut self, shelves: Vec<Shelf>) -> Self {
        self.shelves = shelves;
        self
    }

    pub fn with_failing_shelves(mut self) -> Self {
        self.fail_shelves = true;
        self
    }

    pub fn with_shelf_members(mut self, shelf_id: &str, ids: &[&str]) -> Self {
        self.members.insert(
            shelf_id.to_string(),
            ids.iter().map(|id| id.to_string()).collect(),
        );
        self
    }

    /// The shelf's membership call answers with something other than an array.
    pub fn with_malformed_shelf(mut self, shelf_id: &str) -> Self {
        self.malformed_shelves.insert(shelf_id.to_string());
        self
    }

    pub fn with_book(mut self, book: Book) -> Self {
        self.books.insert(book.id.clone(), book);
        self
    }

    pub fn with_failing_book(mut self, id: &str) -> Self {
        self.failing_books.insert(id.to_string());
        self
    }

    /// Delays the detail lookup of `id`.
    pub fn with_delay(mut self, id: &str, delay: Duration) -> Self {
        self.delays.insert(id.to_string(), delay);
        self
    }
}

impl Catalog for FakeCatalog {
    async fn list_shelves(&self) -> Result<Vec<Shelf>, CatalogError> {
        if self.fail_shelves {
            return Err(transport_error("/users/fake/shelves"));
        }
        Ok(self.shelves.clone())
    }

    async fn list_shelf_book_ids(&self, shelf_id: &str) -> Result<Vec<String>, CatalogError> {
        if self.malformed_shelves.contains(shelf_id) {
            return Err(CatalogError::Shape {
                shelf_id: shelf_id.to_string(),
                found: "an object",
            });
        }
        self.members
            .get(shelf_id)
            .cloned()
            .ok_or_else(|| transport_error(&format!("/shelves/{shelf_id}/forms")))
    }

    async fn get_book(&self, book_id: &str) -> Result<Book, CatalogError> {
        if let Some(delay) = self.delays.get(book_id) {
            tokio::time::sleep(*delay).await;
        }
        let url = format!("/forms/{book_id}");
        if self.failing_books.contains(book_id) {
            return Err(transport_error(&url));
        }
        self.books
            .get(book_id)
            .cloned()
            .ok_or(CatalogError::Decode {
                url,
                message: "unknown book".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_books_with_titles() {
        let books = make_books(&["a", "b"]);
        assert_eq!(books[1].title, "Book b");
        assert_eq!(books[0].author_line(), "Anon");
    }

    #[tokio::test]
    async fn fake_catalog_scripts_failures() {
        let catalog = FakeCatalog::default()
            .with_shelf_members("s1", &["f1"])
            .with_malformed_shelf("s2")
            .with_book(make_book("f1", "One", &[]))
            .with_failing_book("f2");

        assert_eq!(catalog.list_shelf_book_ids("s1").await.unwrap(), vec!["f1"]);
        assert!(matches!(
            catalog.list_shelf_book_ids("s2").await,
            Err(CatalogError::Shape { .. })
        ));
        assert!(catalog.get_book("f1").await.is_ok());
        assert!(matches!(
            catalog.get_book("f2").await,
            Err(CatalogError::Transport { .. })
        ));
        assert!(matches!(
            catalog.get_book("nope").await,
            Err(CatalogError::Decode { .. })
        ));
    }

    #[tokio::test]
    async fn failing_shelves_error() {
        let catalog = FakeCatalog::default().with_failing_shelves();
        assert!(catalog.list_shelves().await.is_err());
    }
}

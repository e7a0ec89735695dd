//! Core domain types for Shelfview.

use std::ops::Range;

use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.glose.com";
pub const DEFAULT_USER_ID: &str = "5a8411b53ed02c04187ff02a";
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Number of book cards shown per page of the grid.
pub const BOOKS_PER_PAGE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub base_url: String,
    pub user_id: String,
    pub auto_select: AutoSelect,
    pub log_filter: String,
}

/// When the first shelf gets picked automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoSelect {
    /// Pick the first shelf whenever the selection is empty, including after
    /// an explicit clear.
    Rearm,
    /// Pick the first shelf only for the very first non-empty shelf list.
    FirstLoadOnly,
}

impl AutoSelect {
    pub fn as_str(&self) -> &'static str {
        match self {
            AutoSelect::Rearm => "rearm",
            AutoSelect::FirstLoadOnly => "first-load-only",
        }
    }
}

impl std::fmt::Display for AutoSelect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AutoSelect {
    type Err = &'static str;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rearm" => Ok(AutoSelect::Rearm),
            "first-load-only" | "once" => Ok(AutoSelect::FirstLoadOnly),
            _ => Err("unknown auto-select mode"),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
            auto_select: AutoSelect::Rearm,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Settings {
    pub fn normalize(&mut self) {
        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        if self.base_url.is_empty() {
            self.base_url = DEFAULT_BASE_URL.to_string();
        }
        self.user_id = self.user_id.trim().to_string();
        if self.user_id.is_empty() {
            self.user_id = DEFAULT_USER_ID.to_string();
        }
        self.log_filter = self.log_filter.trim().to_string();
        if self.log_filter.is_empty() {
            self.log_filter = DEFAULT_LOG_FILTER.to_string();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shelf {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
}

/// Structured price as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Money {
    pub amount: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includes_taxes: Option<bool>,
}

/// The catalog sends either a preformatted string or a structured amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Price {
    Text(String),
    Structured(Money),
}

impl std::fmt::Display for Price {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Price::Text(text) => f.write_str(text),
            Price::Structured(money) => write!(f, "{} {}", money.amount, money.currency),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub authors: Vec<Author>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<Price>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
}

impl Book {
    /// Author names joined for display, empty when there are none.
    pub fn author_line(&self) -> String {
        self.authors
            .iter()
            .map(|author| author.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Rating formatted as `x.x/5`, clamped into the catalog's range.
    pub fn rating_label(&self) -> Option<String> {
        self.rating
            .filter(|rating| rating.is_finite())
            .map(|rating| format!("{:.1}/5", rating.clamp(0.0, 5.0)))
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Reduces `books` to those whose title or any author name contains `query`,
/// ignoring case. A blank query keeps everything.
pub fn filter_books(books: &[Book], query: &str) -> Vec<Book> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return books.to_vec();
    }
    books
        .iter()
        .filter(|book| matches_query(book, &query))
        .cloned()
        .collect()
}

/// `query` must already be trimmed and lowercased.
fn matches_query(book: &Book, query: &str) -> bool {
    book.title.to_lowercase().contains(query)
        || book
            .authors
            .iter()
            .any(|author| author.name.to_lowercase().contains(query))
}

/// 1-based page cursor over a collection of known length.
///
/// The window never stores the length: every operation takes the current
/// length so the same window can follow a collection that grows or shrinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow {
    current_page: usize,
    page_size: usize,
}

impl Default for PageWindow {
    fn default() -> Self {
        Self::new(BOOKS_PER_PAGE)
    }
}

impl PageWindow {
    pub fn new(page_size: usize) -> Self {
        Self {
            current_page: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn total_pages(&self, len: usize) -> usize {
        len.div_ceil(self.page_size).max(1)
    }

    pub fn range(&self, len: usize) -> Range<usize> {
        let start = (self.current_page - 1)
            .saturating_mul(self.page_size)
            .min(len);
        let end = self.current_page.saturating_mul(self.page_size).min(len);
        start..end
    }

    pub fn page<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        &items[self.range(items.len())]
    }

    pub fn has_prev(&self) -> bool {
        self.current_page > 1
    }

    pub fn has_next(&self, len: usize) -> bool {
        self.current_page < self.total_pages(len)
    }

    /// Returns whether the page changed.
    pub fn next(&mut self, len: usize) -> bool {
        if !self.has_next(len) {
            return false;
        }
        self.current_page += 1;
        true
    }

    /// Returns whether the page changed.
    pub fn prev(&mut self) -> bool {
        if !self.has_prev() {
            return false;
        }
        self.current_page -= 1;
        true
    }

    pub fn go_to(&mut self, page: usize, len: usize) {
        self.current_page = page.clamp(1, self.total_pages(len));
    }

    pub fn clamp(&mut self, len: usize) {
        self.current_page = self.current_page.clamp(1, self.total_pages(len));
    }
}

use reqwest::Url;
use serde::de::DeserializeOwned;
use serde_json::Value;
use shelfview_core::{Book, Settings, Shelf};
use tracing::debug;

use crate::{Catalog, CatalogError};

/// [`Catalog`] backed by the public catalog HTTP API.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
    user_id: String,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>, user_id: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user_id: user_id.into(),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.base_url.clone(), settings.user_id.clone())
    }

    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, CatalogError> {
        let mut url = Url::parse(&self.base_url).map_err(|err| CatalogError::Transport {
            url: self.base_url.clone(),
            message: format!("invalid base url: {err}"),
        })?;
        url.path_segments_mut()
            .map_err(|_| CatalogError::Transport {
                url: self.base_url.clone(),
                message: "base url cannot carry a path".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, CatalogError> {
        debug!(%url, "GET");
        let transport = |err: reqwest::Error| CatalogError::Transport {
            url: url.to_string(),
            message: err.to_string(),
        };

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(transport)?;
        let status = resp.status();
        if !status.is_success() {
            return Err(CatalogError::Transport {
                url: url.to_string(),
                message: format!("HTTP {status}"),
            });
        }
        let body = resp.bytes().await.map_err(transport)?;
        serde_json::from_slice(&body).map_err(|err| CatalogError::Decode {
            url: url.to_string(),
            message: err.to_string(),
        })
    }
}

impl Catalog for HttpCatalog {
    async fn list_shelves(&self) -> Result<Vec<Shelf>, CatalogError> {
        let url = self.endpoint(&["users", self.user_id.as_str(), "shelves"])?;
        self.get_json(url).await
    }

    async fn list_shelf_book_ids(&self, shelf_id: &str) -> Result<Vec<String>, CatalogError> {
        let url = self.endpoint(&["shelves", shelf_id, "forms"])?;
        let body: Value = self.get_json(url.clone()).await?;
        let items = match body {
            Value::Array(items) => items,
            other => {
                return Err(CatalogError::Shape {
                    shelf_id: shelf_id.to_string(),
                    found: json_kind(&other),
                });
            }
        };

        items
            .into_iter()
            .enumerate()
            .map(|(index, item)| match item {
                Value::String(id) => Ok(id),
                other => Err(CatalogError::Decode {
                    url: url.to_string(),
                    message: format!("entry {index} is {}, expected a string", json_kind(&other)),
                }),
            })
            .collect()
    }

    async fn get_book(&self, book_id: &str) -> Result<Book, CatalogError> {
        let url = self.endpoint(&["forms", book_id])?;
        self.get_json(url).await
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Query string parameters, in request order.
pub type Params = Vec<(String, String)>;

/// Gets JSON documents from a remote data service.
///
/// The pipeline only ever issues GET requests and decodes the body as JSON,
/// so any source that can answer `url + params` with a JSON value will do.
#[async_trait]
pub trait Getter: Send + Sync {
    /// Gets one JSON document.
    async fn get(&self, url: &str, params: &Params) -> Result<Value>;
}

pub fn param(key: &str, value: impl ToString) -> (String, String) {
    (key.to_owned(), value.to_string())
}

#[async_trait]
impl<T: Getter + ?Sized> Getter for &T {
    async fn get(&self, url: &str, params: &Params) -> Result<Value> {
        (**self).get(url, params).await
    }
}

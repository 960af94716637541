//! Offset/limit pagination over Socrata-style endpoints.

use serde_json::Value;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::getter::{param, Getter, Params};

const LIMIT: &str = "$limit";
const OFFSET: &str = "$offset";

/// Fetches every record of `url`, one page of `page_size` records at a time.
///
/// Stops at the first page holding fewer than `page_size` records, so a total
/// that is an exact multiple of the page size costs one extra, empty request.
/// With `max_pages` set, needing more pages than that is an error.
pub async fn fetch<G: Getter + ?Sized>(
    getter: &G,
    url: &str,
    fixed: &Params,
    page_size: usize,
    max_pages: Option<usize>,
) -> Result<Vec<Value>> {
    if page_size == 0 {
        return Err(Error::InvalidArgument("page size must be positive".into()));
    }
    let mut records = Vec::new();
    let mut pages = 0;
    loop {
        if max_pages.is_some_and(|max| pages >= max) {
            return Err(Error::PageLimit {
                endpoint: url.to_owned(),
                pages,
            });
        }
        let mut params = fixed.clone();
        params.push(param(LIMIT, page_size));
        params.push(param(OFFSET, records.len()));

        let page = match getter.get(url, &params).await? {
            Value::Array(page) => page,
            other => {
                return Err(Error::Decode(format!(
                    "{url} returned {} instead of an array",
                    json_kind(&other)
                )))
            }
        };
        pages += 1;
        let short = page.len() < page_size;
        debug!(url, offset = records.len(), received = page.len(), "page");
        records.extend(page);
        if short {
            break;
        }
    }
    info!(url, records = records.len(), pages, "fetched");
    Ok(records)
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

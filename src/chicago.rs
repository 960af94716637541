use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::getter::{Getter, Params};

/// City of Chicago data portal and Census Bureau API over HTTP.
#[derive(Debug, Clone)]
pub struct Portal {
    client: reqwest::Client,
}

impl Portal {
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Getter for Portal {
    async fn get(&self, url: &str, params: &Params) -> Result<Value> {
        debug!(url, ?params, "GET");
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }
}

/// A row of the community areas dataset (`igwz-8jzy`).
#[derive(Debug, Deserialize)]
pub struct RawCommunityArea {
    pub the_geom: Value,
    pub community: String,
    pub area_num_1: String,
}

/// A row of the census blocks dataset (`bt9m-d2mf`).
#[derive(Debug, Deserialize)]
pub struct RawBlock {
    pub the_geom: Value,
    pub geoid10: String,
}

/// A row of the crimes dataset (`6zsd-86xi`). The portal sends every scalar as a string.
#[derive(Debug, Deserialize)]
pub struct RawCrime {
    pub id: String,
    pub date: String,
    pub primary_type: String,
    pub community_area: Option<String>,
    pub longitude: Option<String>,
    pub latitude: Option<String>,
}

/// Decodes fetched records into one of the raw row types above.
pub fn decode<T: for<'de> Deserialize<'de>>(records: Vec<Value>) -> Result<Vec<T>> {
    records
        .into_iter()
        .map(|record| serde_json::from_value(record).map_err(|e| Error::Decode(e.to_string())))
        .collect()
}

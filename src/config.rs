use std::path::{Path, PathBuf};
use std::time::Duration;

use census::Theme;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Endpoints, paging, census vintage and cache locations for one run.
///
/// Defaults point at the City of Chicago data portal and the 2017 ACS
/// five-year estimates for Cook County.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub community_areas_url: String,
    pub census_blocks_url: String,
    pub crimes_url: String,
    pub acs_url: String,
    /// ACS `for` clause; the geography of each row.
    pub acs_for: String,
    /// ACS `in` clause; the geography containing the rows.
    pub acs_in: String,
    pub page_size: usize,
    pub max_pages: Option<usize>,
    pub request_timeout_secs: Option<u64>,
    pub cache_dir: PathBuf,
    pub community_areas_file: String,
    pub block_groups_file: String,
    pub crimes_file: String,
    pub census_file: String,
    pub themes: Vec<Theme>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            community_areas_url: "https://data.cityofchicago.org/resource/igwz-8jzy.json".into(),
            census_blocks_url: "https://data.cityofchicago.org/resource/bt9m-d2mf.json".into(),
            crimes_url: "https://data.cityofchicago.org/resource/6zsd-86xi.json".into(),
            acs_url: "https://api.census.gov/data/2017/acs/acs5".into(),
            acs_for: "block group:*".into(),
            acs_in: "state:17 county:031".into(),
            page_size: 1000,
            max_pages: Some(10_000),
            request_timeout_secs: None,
            cache_dir: PathBuf::from("data"),
            community_areas_file: "chicago-community-areas.csv".into(),
            block_groups_file: "chicago-block-groups.csv".into(),
            crimes_file: "chicago-crime.csv".into(),
            census_file: "cook-county-acs5-2017.csv".into(),
            themes: Theme::defaults(),
        }
    }
}

impl Config {
    /// Reads a JSON config; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text).map_err(|e| {
            Error::InvalidArgument(format!("config {}: {e}", path.display()))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::InvalidArgument("page_size must be positive".into()));
        }
        if self.max_pages == Some(0) {
            return Err(Error::InvalidArgument("max_pages must be positive".into()));
        }
        if self.themes.is_empty() {
            return Err(Error::InvalidArgument("at least one theme is required".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn community_areas_path(&self) -> PathBuf {
        self.cache_dir.join(&self.community_areas_file)
    }

    pub fn block_groups_path(&self) -> PathBuf {
        self.cache_dir.join(&self.block_groups_file)
    }

    pub fn crimes_path(&self) -> PathBuf {
        self.cache_dir.join(&self.crimes_file)
    }

    pub fn census_path(&self) -> PathBuf {
        self.cache_dir.join(&self.census_file)
    }
}

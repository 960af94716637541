//! Compiles the four datasets and links incidents to their geography.

use std::collections::BTreeMap;

use geo::Point;
use tracing::{info, warn};

use crate::cache;
use crate::chicago::{decode, RawBlock, RawCommunityArea, RawCrime};
use crate::config::Config;
use crate::demographics::{self, CensusTable};
use crate::error::{Error, Result};
use crate::fetch::fetch;
use crate::geometry::{self, block_group_key};
use crate::getter::{param, Getter};
use crate::join::{join, join_on, SpatialIndex};
use crate::records::{BlockGroup, CommunityArea, CrimeIncident, LinkedIncident};

/// Where datasets come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    /// Fetch from the remote services and overwrite the cache.
    Live,
    /// Read what an earlier live run cached.
    Cached,
}

/// A validated invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub year_min: i32,
    pub year_max: i32,
    /// Offense categories, upper-cased as the portal spells them.
    pub crimes: Vec<String>,
    pub k: usize,
    pub source: Source,
}

impl Request {
    pub fn new(year_min: i32, year_max: i32, crimes: &[String], k: usize, cached: bool) -> Result<Self> {
        if year_min > year_max {
            return Err(Error::InvalidArgument(format!(
                "year range {year_min}..={year_max} is empty"
            )));
        }
        let crimes: Vec<String> = crimes
            .iter()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .collect();
        if crimes.is_empty() {
            return Err(Error::InvalidArgument("no offense categories given".into()));
        }
        Ok(Self {
            year_min,
            year_max,
            crimes,
            k,
            source: if cached { Source::Cached } else { Source::Live },
        })
    }
}

/// Everything the analytics need.
#[derive(Debug)]
pub struct Datasets {
    pub community_areas: Vec<CommunityArea>,
    pub block_groups: SpatialIndex,
    pub incidents: Vec<LinkedIncident>,
    pub census: CensusTable,
}

impl Datasets {
    pub fn block_group_at(&self, point: &Point<f64>) -> Option<&str> {
        self.block_groups.locate(point)
    }
}

pub struct Pipeline<G> {
    config: Config,
    getter: G,
}

impl<G: Getter> Pipeline<G> {
    pub fn new(config: Config, getter: G) -> Self {
        Self { config, getter }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn compile(&self, request: &Request) -> Result<Datasets> {
        let community_areas = self.community_areas(request.source).await?;
        let block_groups = self.block_groups(request.source).await?;
        let crimes = self
            .crimes(request.year_min, request.year_max, request.source)
            .await?;
        let census = self.census(request.source).await?;

        let block_groups = SpatialIndex::new(block_groups.into_iter().map(|b| (b.id, b.area)));
        let incidents = link(crimes, &community_areas, &block_groups);
        Ok(Datasets {
            community_areas,
            block_groups,
            incidents,
            census,
        })
    }

    pub async fn community_areas(&self, source: Source) -> Result<Vec<CommunityArea>> {
        let path = self.config.community_areas_path();
        if source == Source::Cached {
            return cache::read_community_areas(&path);
        }
        let rows = self.fetch(&self.config.community_areas_url, Vec::new()).await?;
        let areas = decode::<RawCommunityArea>(rows)?
            .into_iter()
            .map(CommunityArea::try_from)
            .collect::<Result<Vec<_>>>()?;
        info!(areas = areas.len(), "community areas");
        cache::write_community_areas(&path, &areas)?;
        Ok(areas)
    }

    /// Census blocks merged into block groups.
    pub async fn block_groups(&self, source: Source) -> Result<Vec<BlockGroup>> {
        let path = self.config.block_groups_path();
        if source == Source::Cached {
            return cache::read_block_groups(&path);
        }
        let rows = self.fetch(&self.config.census_blocks_url, Vec::new()).await?;
        let blocks = decode::<RawBlock>(rows)?
            .into_iter()
            .map(|block| Ok((block.geoid10, geometry::area(&block.the_geom)?)))
            .collect::<Result<Vec<_>>>()?;
        let block_count = blocks.len();
        let groups: Vec<_> = geometry::merge(blocks, block_group_key)?
            .into_iter()
            .map(|(id, area)| BlockGroup { id, area })
            .collect();
        info!(blocks = block_count, block_groups = groups.len(), "block groups");
        cache::write_block_groups(&path, &groups)?;
        Ok(groups)
    }

    /// Incidents reported from `year_min` through `year_max`, one paged fetch per year.
    pub async fn crimes(&self, year_min: i32, year_max: i32, source: Source) -> Result<Vec<CrimeIncident>> {
        let path = self.config.crimes_path();
        if source == Source::Cached {
            let mut crimes = cache::read_crimes(&path)?;
            crimes.retain(|c| (year_min..=year_max).contains(&c.year()));
            return Ok(crimes);
        }
        let mut crimes = Vec::new();
        for year in year_min..=year_max {
            let rows = self
                .fetch(&self.config.crimes_url, vec![param("year", year)])
                .await?;
            let before = crimes.len();
            for raw in decode::<RawCrime>(rows)? {
                crimes.push(CrimeIncident::try_from(raw)?);
            }
            info!(year, incidents = crimes.len() - before, "crimes");
        }
        cache::write_crimes(&path, &crimes)?;
        Ok(crimes)
    }

    pub async fn census(&self, source: Source) -> Result<CensusTable> {
        let path = self.config.census_path();
        if source == Source::Cached {
            return cache::read_census(&path);
        }
        let census = demographics::compile(&self.getter, &self.config).await?;
        info!(block_groups = census.len(), labels = census.labels.len(), "census");
        cache::write_census(&path, &census)?;
        Ok(census)
    }

    async fn fetch(&self, url: &str, fixed: Vec<(String, String)>) -> Result<Vec<serde_json::Value>> {
        fetch(
            &self.getter,
            url,
            &fixed,
            self.config.page_size,
            self.config.max_pages,
        )
        .await
    }
}

/// Joins incidents to their community area by number, then to the block
/// group containing them. Incidents failing either join are dropped.
pub fn link(
    crimes: Vec<CrimeIncident>,
    community_areas: &[CommunityArea],
    block_groups: &SpatialIndex,
) -> Vec<LinkedIncident> {
    let total = crimes.len();
    let names: BTreeMap<u32, String> = community_areas
        .iter()
        .map(|area| (area.number, area.name.clone()))
        .collect();

    let in_areas = join_on(crimes, &names, |crime| crime.community_area);
    let keyed = in_areas.len();
    let linked: Vec<_> = join(in_areas, block_groups, |(crime, _)| crime.location())
        .into_iter()
        .map(|((incident, community), block_group)| LinkedIncident {
            incident,
            community,
            block_group,
        })
        .collect();

    if linked.len() < total {
        warn!(
            total,
            without_community_area = total - keyed,
            outside_block_groups = keyed - linked.len(),
            "incidents dropped while linking"
        );
    }
    info!(incidents = linked.len(), "linked");
    linked
}

//! CSV copies of the compiled datasets, so later runs can skip the network.
//!
//! Every column is written as text: geometries as GeoJSON, dates as ISO
//! dates, numbers in their shortest round-trip form. Reading forces every
//! column back to text so nothing is reinterpreted on the way in.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use census::CensusRecord;
use polars::prelude::*;
use tracing::info;

use crate::chicago::RawCrime;
use crate::demographics::CensusTable;
use crate::error::{Error, Result};
use crate::geometry::{from_geojson_text, to_geojson_text};
use crate::records::{BlockGroup, CommunityArea, CrimeIncident};

const BLOCK_GROUP: &str = "block_group";
const GEOMETRY: &str = "the_geom";

fn cache_error(path: &Path, reason: impl ToString) -> Error {
    Error::Cache {
        path: path.to_owned(),
        reason: reason.to_string(),
    }
}

fn write_df(path: &Path, df: &mut DataFrame) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file)
        .finish(df)
        .map_err(|e| cache_error(path, e))?;
    info!(path = %path.display(), rows = df.height(), "cached");
    Ok(())
}

fn read_df(path: &Path) -> Result<DataFrame> {
    let df = CsvReader::from_path(path)
        .and_then(|reader| reader.has_header(true).infer_schema(Some(0)).finish())
        .map_err(|e| cache_error(path, e))?;
    info!(path = %path.display(), rows = df.height(), "loaded from cache");
    Ok(df)
}

fn frame(path: &Path, columns: Vec<Series>) -> Result<DataFrame> {
    DataFrame::new(columns).map_err(|e| cache_error(path, e))
}

fn text(df: &DataFrame, path: &Path, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name).map_err(|e| cache_error(path, e))?;
    let values = column.str().map_err(|e| cache_error(path, e))?;
    Ok(values.into_iter().map(|v| v.map(str::to_owned)).collect())
}

fn required(path: &Path, name: &str, value: Option<String>) -> Result<String> {
    value.ok_or_else(|| cache_error(path, format!("empty {name} cell")))
}

pub fn write_community_areas(path: &Path, areas: &[CommunityArea]) -> Result<()> {
    let geometries = areas
        .iter()
        .map(|a| to_geojson_text(&a.area))
        .collect::<Result<Vec<_>>>()?;
    let mut df = frame(
        path,
        vec![
            Series::new(
                "area_number",
                areas.iter().map(|a| a.number.to_string()).collect::<Vec<_>>(),
            ),
            Series::new(
                "community",
                areas.iter().map(|a| a.name.clone()).collect::<Vec<_>>(),
            ),
            Series::new(GEOMETRY, geometries),
        ],
    )?;
    write_df(path, &mut df)
}

pub fn read_community_areas(path: &Path) -> Result<Vec<CommunityArea>> {
    let df = read_df(path)?;
    let numbers = text(&df, path, "area_number")?;
    let names = text(&df, path, "community")?;
    let geometries = text(&df, path, GEOMETRY)?;
    numbers
        .into_iter()
        .zip(names)
        .zip(geometries)
        .map(|((number, name), geometry)| {
            let number = required(path, "area_number", number)?;
            Ok(CommunityArea {
                number: number
                    .parse()
                    .map_err(|_| cache_error(path, format!("bad area number {number:?}")))?,
                name: required(path, "community", name)?,
                area: from_geojson_text(&required(path, GEOMETRY, geometry)?)
                    .map_err(|e| cache_error(path, e))?,
            })
        })
        .collect()
}

pub fn write_block_groups(path: &Path, block_groups: &[BlockGroup]) -> Result<()> {
    let geometries = block_groups
        .iter()
        .map(|b| to_geojson_text(&b.area))
        .collect::<Result<Vec<_>>>()?;
    let mut df = frame(
        path,
        vec![
            Series::new(
                BLOCK_GROUP,
                block_groups.iter().map(|b| b.id.clone()).collect::<Vec<_>>(),
            ),
            Series::new(GEOMETRY, geometries),
        ],
    )?;
    write_df(path, &mut df)
}

pub fn read_block_groups(path: &Path) -> Result<Vec<BlockGroup>> {
    let df = read_df(path)?;
    let ids = text(&df, path, BLOCK_GROUP)?;
    let geometries = text(&df, path, GEOMETRY)?;
    ids.into_iter()
        .zip(geometries)
        .map(|(id, geometry)| {
            Ok(BlockGroup {
                id: required(path, BLOCK_GROUP, id)?,
                area: from_geojson_text(&required(path, GEOMETRY, geometry)?)
                    .map_err(|e| cache_error(path, e))?,
            })
        })
        .collect()
}

pub fn write_crimes(path: &Path, crimes: &[CrimeIncident]) -> Result<()> {
    let mut df = frame(
        path,
        vec![
            Series::new("id", crimes.iter().map(|c| c.id.clone()).collect::<Vec<_>>()),
            Series::new(
                "date",
                crimes.iter().map(|c| c.date.to_string()).collect::<Vec<_>>(),
            ),
            Series::new(
                "primary_type",
                crimes
                    .iter()
                    .map(|c| c.primary_type.clone())
                    .collect::<Vec<_>>(),
            ),
            Series::new(
                "community_area",
                crimes
                    .iter()
                    .map(|c| c.community_area.map(|n| n.to_string()))
                    .collect::<Vec<_>>(),
            ),
            Series::new(
                "longitude",
                crimes
                    .iter()
                    .map(|c| c.longitude.map(|x| x.to_string()))
                    .collect::<Vec<_>>(),
            ),
            Series::new(
                "latitude",
                crimes
                    .iter()
                    .map(|c| c.latitude.map(|y| y.to_string()))
                    .collect::<Vec<_>>(),
            ),
        ],
    )?;
    write_df(path, &mut df)
}

pub fn read_crimes(path: &Path) -> Result<Vec<CrimeIncident>> {
    let df = read_df(path)?;
    let ids = text(&df, path, "id")?;
    let dates = text(&df, path, "date")?;
    let types = text(&df, path, "primary_type")?;
    let areas = text(&df, path, "community_area")?;
    let longitudes = text(&df, path, "longitude")?;
    let latitudes = text(&df, path, "latitude")?;

    let mut crimes = Vec::with_capacity(df.height());
    for (i, id) in ids.into_iter().enumerate() {
        let raw = RawCrime {
            id: required(path, "id", id)?,
            date: required(path, "date", dates[i].clone())?,
            primary_type: required(path, "primary_type", types[i].clone())?,
            community_area: areas[i].clone(),
            longitude: longitudes[i].clone(),
            latitude: latitudes[i].clone(),
        };
        crimes.push(CrimeIncident::try_from(raw).map_err(|e| cache_error(path, e))?);
    }
    Ok(crimes)
}

/// One row per block group; absent proportions are empty cells, undefined ones `NaN`.
pub fn write_census(path: &Path, census: &CensusTable) -> Result<()> {
    let records: Vec<&CensusRecord> = census.records.values().collect();
    let mut columns = vec![Series::new(
        BLOCK_GROUP,
        records
            .iter()
            .map(|r| r.block_group.clone())
            .collect::<Vec<_>>(),
    )];
    for label in &census.labels {
        columns.push(Series::new(
            label,
            records
                .iter()
                .map(|r| r.proportion(label).map(|p| p.to_string()))
                .collect::<Vec<_>>(),
        ));
    }
    let mut df = frame(path, columns)?;
    write_df(path, &mut df)
}

pub fn read_census(path: &Path) -> Result<CensusTable> {
    let df = read_df(path)?;
    let labels: Vec<String> = df
        .get_column_names()
        .into_iter()
        .filter(|name| *name != BLOCK_GROUP)
        .map(str::to_owned)
        .collect();

    let mut records: Vec<CensusRecord> = text(&df, path, BLOCK_GROUP)?
        .into_iter()
        .map(|id| required(path, BLOCK_GROUP, id).map(|id| CensusRecord::new(&id)))
        .collect::<Result<_>>()?;
    for label in &labels {
        for (record, value) in records.iter_mut().zip(text(&df, path, label)?) {
            if let Some(value) = value {
                let proportion = value
                    .trim()
                    .parse()
                    .map_err(|_| cache_error(path, format!("bad proportion {value:?}")))?;
                record.proportions.insert(label.clone(), proportion);
            }
        }
    }
    let records: BTreeMap<_, _> = records
        .into_iter()
        .map(|r| (r.block_group.clone(), r))
        .collect();
    Ok(CensusTable { labels, records })
}

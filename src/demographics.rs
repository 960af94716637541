//! ACS block group tables, converted to proportions and merged across themes.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use census::{CensusRecord, LocationKey, Theme, LOCATION_COLUMNS};
use serde_json::Value;
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::getter::{param, Getter, Params};

/// Proportions by label for one row.
type Row = BTreeMap<String, f64>;

/// Demographic proportions for every block group, keyed by block group id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CensusTable {
    /// Category labels of all themes, in theme order.
    pub labels: Vec<String>,
    pub records: BTreeMap<String, CensusRecord>,
}

impl CensusTable {
    pub fn get(&self, block_group: &str) -> Option<&CensusRecord> {
        self.records.get(block_group)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn params(theme: &Theme, config: &Config) -> Params {
    vec![
        param("get", theme.codes().collect::<Vec<_>>().join(",")),
        param("for", &config.acs_for),
        param("in", &config.acs_in),
    ]
}

/// Requests every theme and merges them into one table.
pub async fn compile<G: Getter + ?Sized>(getter: &G, config: &Config) -> Result<CensusTable> {
    let mut tables = Vec::with_capacity(config.themes.len());
    for theme in &config.themes {
        let body = getter.get(&config.acs_url, &params(theme, config)).await?;
        let table = parse_theme(theme, body)?;
        info!(theme = %theme.name, block_groups = table.len(), "census theme");
        tables.push(table);
    }
    Ok(merge(&config.themes, tables))
}

/// Outer-joins theme tables on their location and keys the result by block group.
///
/// A block group missing from one theme's table simply has none of that
/// theme's labels.
pub fn merge(themes: &[Theme], tables: Vec<BTreeMap<LocationKey, Row>>) -> CensusTable {
    let mut merged: BTreeMap<LocationKey, Row> = BTreeMap::new();
    for table in tables {
        for (location, row) in table {
            merged.entry(location).or_default().extend(row);
        }
    }
    let records = merged
        .into_iter()
        .map(|(location, proportions)| {
            let block_group = location.block_group_id();
            let record = CensusRecord {
                block_group: block_group.clone(),
                proportions,
            };
            (block_group, record)
        })
        .collect();
    CensusTable {
        labels: themes
            .iter()
            .flat_map(|theme| theme.labels().map(str::to_owned))
            .collect(),
        records,
    }
}

/// Reads one theme's response: a header row of variable codes and location
/// columns, then one row of counts per block group.
pub fn parse_theme(theme: &Theme, body: Value) -> Result<BTreeMap<LocationKey, Row>> {
    let Value::Array(rows) = body else {
        return Err(Error::Decode("census response is not an array".into()));
    };
    let mut rows = rows.into_iter();
    let header: Vec<String> = match rows.next() {
        Some(header) => serde_json::from_value(header)?,
        None => return Err(Error::Decode("census response has no header".into())),
    };
    let column = |name: &str| {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| Error::Decode(format!("census response has no {name:?} column")))
    };
    let location = LOCATION_COLUMNS
        .iter()
        .map(|name| column(*name))
        .collect::<Result<Vec<_>>>()?;
    let respondents = column(theme.respondents.code.as_str())?;
    let categories = theme
        .categories
        .iter()
        .map(|v| Ok((v.label.as_str(), column(v.code.as_str())?)))
        .collect::<Result<Vec<_>>>()?;

    let mut table = BTreeMap::new();
    for row in rows {
        let row: Vec<Value> = serde_json::from_value(row)?;
        let cell = |i: usize| {
            row.get(i)
                .ok_or_else(|| Error::Decode(format!("census row is missing column {i}")))
        };
        let part = |i: usize| -> Result<String> {
            match cell(location[i])? {
                Value::String(s) => Ok(s.clone()),
                other => Ok(other.to_string()),
            }
        };
        let key = LocationKey::new(&part(0)?, &part(1)?, &part(2)?, &part(3)?);
        let total = count(cell(respondents)?)?;
        let proportions = categories
            .iter()
            .map(|&(label, i)| Ok((label.to_owned(), proportion(count(cell(i)?)?, total))))
            .collect::<Result<Row>>()?;
        match table.entry(key) {
            Entry::Vacant(entry) => {
                entry.insert(proportions);
            }
            Entry::Occupied(entry) => {
                return Err(Error::Decode(format!(
                    "census response repeats block group {}",
                    entry.key().block_group_id()
                )));
            }
        }
    }
    Ok(table)
}

/// `count / total`, NaN when the total is zero. Null cells arrive as NaN and stay NaN.
pub fn proportion(count: f64, total: f64) -> f64 {
    if total == 0.0 {
        f64::NAN
    } else {
        count / total
    }
}

fn count(cell: &Value) -> Result<f64> {
    match cell {
        Value::Null => Ok(f64::NAN),
        Value::Number(n) => Ok(n.as_f64().unwrap_or(f64::NAN)),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| Error::Decode(format!("census count {s:?} is not a number"))),
        other => Err(Error::Decode(format!("census count {other} is not a number"))),
    }
}

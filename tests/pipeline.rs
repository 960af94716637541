//! Compiles every dataset from an in-memory portal, then again from the cache.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use census::{Theme, Variable};
use serde_json::{json, Value};

use crimelink::analytics::{self, Field};
use crimelink::getter::{Getter, Params};
use crimelink::{Config, Pipeline, Request, Result};

const AREAS: &str = "mem://areas";
const BLOCKS: &str = "mem://blocks";
const CRIMES: &str = "mem://crimes";
const ACS: &str = "mem://acs";

fn square(x: f64, y: f64, side: f64) -> Value {
    json!({
        "type": "MultiPolygon",
        "coordinates": [[[[x, y], [x + side, y], [x + side, y + side], [x, y + side], [x, y]]]]
    })
}

fn crime(id: u32, date: &str, kind: &str, area: &str, location: Option<(f64, f64)>) -> Value {
    let mut row = json!({
        "id": id.to_string(),
        "date": format!("{date}T12:00:00.000"),
        "primary_type": kind,
        "community_area": area,
        "year": &date[..4],
    });
    if let Some((x, y)) = location {
        row["longitude"] = json!(x.to_string());
        row["latitude"] = json!(y.to_string());
    }
    row
}

struct Portal {
    tables: HashMap<&'static str, Vec<Value>>,
    requests: Mutex<usize>,
}

impl Portal {
    fn new() -> Self {
        let areas = vec![
            json!({ "the_geom": square(0.0, 0.0, 4.0), "community": "LOOP", "area_num_1": "32" }),
            json!({ "the_geom": square(4.0, 0.0, 4.0), "community": "DOUGLAS", "area_num_1": "35" }),
        ];
        let blocks = vec![
            // Two blocks of group ...1001, sharing an edge.
            json!({ "the_geom": square(0.0, 0.0, 1.0), "geoid10": "170310101001001" }),
            json!({ "the_geom": square(1.0, 0.0, 1.0), "geoid10": "170310101001002" }),
            json!({ "the_geom": square(4.0, 0.0, 1.0), "geoid10": "170310102001001" }),
        ];
        let mut crimes = Vec::new();
        let mut id = 0;
        let mut add = |n: usize, date: &str, kind: &str, area: &str, at: Option<(f64, f64)>| {
            for _ in 0..n {
                id += 1;
                crimes.push(crime(id, date, kind, area, at));
            }
        };
        add(2, "2018-07-02", "THEFT", "32", Some((0.5, 0.5)));
        add(3, "2019-07-09", "THEFT", "32", Some((1.5, 0.5)));
        add(4, "2018-03-01", "THEFT", "35", Some((4.5, 0.5)));
        add(1, "2019-03-01", "THEFT", "35", Some((4.5, 0.5)));
        add(2, "2019-03-01", "BATTERY", "35", Some((4.5, 0.5)));
        // Dropped: no location, unknown area, outside every block group.
        add(1, "2019-03-01", "THEFT", "32", None);
        add(1, "2019-03-01", "THEFT", "77", Some((0.5, 0.5)));
        add(1, "2019-03-01", "THEFT", "32", Some((3.5, 3.5)));

        Self {
            tables: HashMap::from([(AREAS, areas), (BLOCKS, blocks), (CRIMES, crimes)]),
            requests: Mutex::new(0),
        }
    }
}

fn lookup<'a>(params: &'a Params, key: &str) -> Option<&'a str> {
    params
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[async_trait]
impl Getter for Portal {
    async fn get(&self, url: &str, params: &Params) -> Result<Value> {
        *self.requests.lock().unwrap() += 1;
        if url == ACS {
            return Ok(json!([
                ["H_001E", "H_002E", "H_003E", "state", "county", "tract", "block group"],
                ["10", "6", "4", "17", "031", "010100", "1"],
                ["0", "0", "0", "17", "031", "010200", "1"]
            ]));
        }
        let year = lookup(params, "year");
        let rows: Vec<&Value> = self.tables[url]
            .iter()
            .filter(|row| year.map_or(true, |y| row["year"] == y))
            .collect();
        let limit: usize = lookup(params, "$limit").unwrap().parse().unwrap();
        let offset: usize = lookup(params, "$offset").unwrap().parse().unwrap();
        Ok(Value::Array(
            rows.into_iter().skip(offset).take(limit).cloned().collect(),
        ))
    }
}

fn config(dir: &std::path::Path) -> Config {
    Config {
        community_areas_url: AREAS.into(),
        census_blocks_url: BLOCKS.into(),
        crimes_url: CRIMES.into(),
        acs_url: ACS.into(),
        page_size: 2,
        cache_dir: dir.to_owned(),
        themes: vec![Theme {
            name: "heating".into(),
            respondents: Variable::new("H_001E", "heat_respondents"),
            categories: vec![
                Variable::new("H_002E", "heat_gas"),
                Variable::new("H_003E", "heat_electric"),
            ],
        }],
        ..Config::default()
    }
}

#[tokio::test]
async fn test_live_then_cached() {
    let dir = tempfile::tempdir().unwrap();
    let request = Request::new(2018, 2019, &["theft".to_owned()], 3, false).unwrap();

    let portal = Portal::new();
    let live = Pipeline::new(config(dir.path()), &portal);
    let data = live.compile(&request).await.unwrap();

    assert_eq!(data.community_areas.len(), 2);
    assert_eq!(data.block_groups.len(), 2);
    assert_eq!(data.incidents.len(), 12);
    assert_eq!(data.census.len(), 2);

    let loop_group = data.incidents.iter().find(|i| i.community == "LOOP").unwrap();
    assert_eq!(loop_group.block_group, "170310101001");

    // Theft in 2018: 2 + 4, in 2019: 3 + 1.
    let theft: Vec<_> = data
        .incidents
        .iter()
        .filter(|i| i.incident.primary_type == "THEFT")
        .collect();
    let overall = analytics::change_overall(theft, 2018, 2019);
    assert_eq!(overall.change, Some((4.0 - 6.0) / 6.0));

    let top = analytics::rank_block_group(
        &data.incidents,
        &data.census,
        &live.config().themes,
        "THEFT",
        2018,
        2019,
        0,
    )
    .unwrap();
    assert_eq!(top.block_group, "170310101001");
    assert_eq!((top.count_min, top.count_max), (2, 3));
    assert_eq!(top.indicators[0].label, "heat_gas");
    assert_eq!(top.indicators[0].proportion, 0.6);

    let second = analytics::rank_block_group(
        &data.incidents,
        &data.census,
        &live.config().themes,
        "THEFT",
        2018,
        2019,
        1,
    )
    .unwrap();
    // Respondent total of zero: every proportion is NaN, so nothing dominates.
    assert_eq!(second.block_group, "170310102001");
    assert!(second.indicators.is_empty());
    assert!(data
        .census
        .get("170310102001")
        .unwrap()
        .proportion("heat_gas")
        .unwrap()
        .is_nan());

    let rows = analytics::probability(&data.incidents, Field::Community, "DOUGLAS", Field::PrimaryType)
        .unwrap();
    assert_eq!(rows[0].group, "THEFT");
    assert!((rows[0].probability - 5.0 / 7.0).abs() < 1e-12);

    let cached_request = Request::new(2019, 2019, &["theft".to_owned()], 3, true).unwrap();
    let offline = Portal::new();
    let cached = Pipeline::new(config(dir.path()), &offline);
    let reloaded = cached.compile(&cached_request).await.unwrap();
    assert_eq!(*offline.requests.lock().unwrap(), 0);
    assert!(*portal.requests.lock().unwrap() > 0);
    assert_eq!(reloaded.community_areas, data.community_areas);
    let expected: Vec<_> = data
        .incidents
        .iter()
        .filter(|i| i.year() == 2019)
        .cloned()
        .collect();
    assert_eq!(reloaded.incidents, expected);
    assert_eq!(reloaded.census.labels, data.census.labels);
}

//! Summary statistics over linked incidents.
//!
//! Every function takes any iterator of `&LinkedIncident`, so callers can
//! narrow the data first (see [`in_month`]). Nothing here mutates its input.
//! Ratios whose denominator is zero come back as `None`.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use census::Theme;
use chrono::{Datelike, Duration, NaiveDate};

use crate::demographics::CensusTable;
use crate::error::{Error, Result};
use crate::records::LinkedIncident;

/// An incident attribute to filter or group by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    PrimaryType,
    Community,
    BlockGroup,
}

impl Field {
    pub fn of<'a>(&self, incident: &'a LinkedIncident) -> &'a str {
        match self {
            Self::PrimaryType => &incident.incident.primary_type,
            Self::Community => &incident.community,
            Self::BlockGroup => &incident.block_group,
        }
    }
}

impl FromStr for Field {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "primary_type" => Ok(Self::PrimaryType),
            "community" => Ok(Self::Community),
            "block_group" => Ok(Self::BlockGroup),
            other => Err(Error::InvalidArgument(format!("unknown field {other:?}"))),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::PrimaryType => "primary_type",
            Self::Community => "community",
            Self::BlockGroup => "block_group",
        })
    }
}

pub fn counts_by_year<'a, I>(incidents: I) -> BTreeMap<i32, u64>
where
    I: IntoIterator<Item = &'a LinkedIncident>,
{
    let mut counts = BTreeMap::new();
    for incident in incidents {
        *counts.entry(incident.year()).or_insert(0) += 1;
    }
    counts
}

/// `(counts[year_max] - counts[year_min]) / counts[year_min]`; missing years count as zero.
///
/// `None` when the base year has no incidents.
pub fn year_change(counts: &BTreeMap<i32, u64>, year_min: i32, year_max: i32) -> Option<f64> {
    let count = |year: i32| counts.get(&year).copied().unwrap_or(0) as f64;
    let base = count(year_min);
    if base == 0.0 {
        return None;
    }
    Some((count(year_max) - base) / base)
}

#[derive(Debug, Clone, PartialEq)]
pub struct YearChange {
    /// Every year of the range, zero when nothing happened.
    pub counts: BTreeMap<i32, u64>,
    pub change: Option<f64>,
}

pub fn change_overall<'a, I>(incidents: I, year_min: i32, year_max: i32) -> YearChange
where
    I: IntoIterator<Item = &'a LinkedIncident>,
{
    let counts = fill_years(counts_by_year(incidents), year_min, year_max);
    let change = year_change(&counts, year_min, year_max);
    YearChange { counts, change }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupChange {
    pub group: String,
    pub counts: BTreeMap<i32, u64>,
    pub change: Option<f64>,
}

/// Change over the range for every value of `field`, largest increase first.
///
/// Groups with an undefined change sort last; ties go by group name.
pub fn change_by<'a, I>(incidents: I, year_min: i32, year_max: i32, field: Field) -> Vec<GroupChange>
where
    I: IntoIterator<Item = &'a LinkedIncident>,
{
    let mut groups: BTreeMap<&str, BTreeMap<i32, u64>> = BTreeMap::new();
    for incident in incidents {
        *groups
            .entry(field.of(incident))
            .or_default()
            .entry(incident.year())
            .or_insert(0) += 1;
    }
    let mut changes: Vec<_> = groups
        .into_iter()
        .map(|(group, counts)| {
            let counts = fill_years(counts, year_min, year_max);
            GroupChange {
                group: group.to_owned(),
                change: year_change(&counts, year_min, year_max),
                counts,
            }
        })
        .collect();
    changes.sort_by(|a, b| descending(a.change, b.change).then_with(|| a.group.cmp(&b.group)));
    changes
}

/// Most represented category of one demographic theme.
#[derive(Debug, Clone, PartialEq)]
pub struct Indicator {
    pub theme: String,
    pub label: String,
    pub proportion: f64,
}

/// A block group at a given position in the incident ranking.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedUnit {
    pub rank: usize,
    pub block_group: String,
    /// Community areas the block group's incidents were reported in.
    pub communities: Vec<String>,
    pub count_min: u64,
    pub count_max: u64,
    /// One per theme with census coverage, in theme order.
    pub indicators: Vec<Indicator>,
}

#[derive(Default)]
struct Tally {
    by_year: BTreeMap<i32, u64>,
}

impl Tally {
    fn get(&self, year: i32) -> u64 {
        self.by_year.get(&year).copied().unwrap_or(0)
    }
}

/// The block group with the `rank`-th most incidents of `category` in `year_max`.
///
/// `rank` is 0-indexed. Ties in the count go to the lower block group id.
pub fn rank_block_group<'a, I>(
    incidents: I,
    census: &CensusTable,
    themes: &[Theme],
    category: &str,
    year_min: i32,
    year_max: i32,
    rank: usize,
) -> Result<RankedUnit>
where
    I: IntoIterator<Item = &'a LinkedIncident>,
{
    let category = category.trim().to_uppercase();
    let mut tallies: BTreeMap<&str, Tally> = BTreeMap::new();
    let mut communities: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for incident in incidents {
        communities
            .entry(incident.block_group.as_str())
            .or_default()
            .insert(incident.community.as_str());
        if incident.incident.primary_type == category {
            *tallies
                .entry(incident.block_group.as_str())
                .or_default()
                .by_year
                .entry(incident.year())
                .or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<_> = tallies.into_iter().collect();
    ranked.sort_by_key(|(block_group, tally)| (Reverse(tally.get(year_max)), *block_group));
    let available = ranked.len();
    let (block_group, tally) = ranked
        .get(rank)
        .ok_or(Error::RankOutOfRange { rank, available })?;

    let indicators: Vec<Indicator> = census
        .get(block_group)
        .map(|record| {
            themes
                .iter()
                .filter_map(|theme| {
                    record.dominant(theme).map(|(label, proportion)| Indicator {
                        theme: theme.name.clone(),
                        label: label.to_owned(),
                        proportion,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(RankedUnit {
        rank,
        block_group: (*block_group).to_owned(),
        communities: communities
            .get(block_group)
            .into_iter()
            .flatten()
            .map(|c| (*c).to_owned())
            .collect(),
        count_min: tally.get(year_min),
        count_max: tally.get(year_max),
        indicators,
    })
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityRow {
    pub group: String,
    pub incidents: u64,
    pub probability: f64,
}

/// Distribution of `group` among incidents whose `filter` equals `value`.
///
/// Rows are ordered by probability, highest first, ties by group. `None` when
/// no incident matches the filter, since the distribution is then undefined.
pub fn probability<'a, I>(
    incidents: I,
    filter: Field,
    value: &str,
    group: Field,
) -> Option<Vec<ProbabilityRow>>
where
    I: IntoIterator<Item = &'a LinkedIncident>,
{
    let mut counts: BTreeMap<&str, u64> = BTreeMap::new();
    for incident in incidents.into_iter().filter(|i| filter.of(i) == value) {
        *counts.entry(group.of(incident)).or_insert(0) += 1;
    }
    let total: u64 = counts.values().sum();
    if total == 0 {
        return None;
    }
    let mut rows: Vec<_> = counts
        .into_iter()
        .map(|(group, incidents)| ProbabilityRow {
            group: group.to_owned(),
            incidents,
            probability: incidents as f64 / total as f64,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.probability
            .total_cmp(&a.probability)
            .then_with(|| a.group.cmp(&b.group))
    });
    Some(rows)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeeklyCount {
    /// The Monday closing the week.
    pub week_ending: NaiveDate,
    pub incidents: u64,
}

/// Incidents of `category` per week, weeks ending on Monday, empty weeks included.
pub fn weekly_trend<'a, I>(incidents: I, category: &str) -> Vec<WeeklyCount>
where
    I: IntoIterator<Item = &'a LinkedIncident>,
{
    let category = category.trim().to_uppercase();
    let mut weeks: BTreeMap<NaiveDate, u64> = BTreeMap::new();
    for incident in incidents {
        if incident.incident.primary_type == category {
            *weeks.entry(week_ending(incident.incident.date)).or_insert(0) += 1;
        }
    }
    let (Some(&first), Some(&last)) = (weeks.keys().next(), weeks.keys().next_back()) else {
        return Vec::new();
    };
    let mut trend = Vec::new();
    let mut week = first;
    while week <= last {
        trend.push(WeeklyCount {
            week_ending: week,
            incidents: weeks.get(&week).copied().unwrap_or(0),
        });
        week += Duration::days(7);
    }
    trend
}

pub fn week_ending(date: NaiveDate) -> NaiveDate {
    let days = (7 - i64::from(date.weekday().num_days_from_monday())) % 7;
    date + Duration::days(days)
}

/// Incidents reported in calendar month `month` (1 to 12) of any year.
pub fn in_month<'a, I>(incidents: I, month: u32) -> impl Iterator<Item = &'a LinkedIncident>
where
    I: IntoIterator<Item = &'a LinkedIncident>,
{
    incidents
        .into_iter()
        .filter(move |incident| incident.incident.date.month() == month)
}

fn fill_years(mut counts: BTreeMap<i32, u64>, year_min: i32, year_max: i32) -> BTreeMap<i32, u64> {
    counts.retain(|year, _| (year_min..=year_max).contains(year));
    for year in year_min..=year_max {
        counts.entry(year).or_insert(0);
    }
    counts
}

// Defined values first, largest first.
fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.total_cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use census::CensusRecord;

    use super::*;
    use crate::records::CrimeIncident;

    fn incident(date: &str, kind: &str, community: &str, block_group: &str) -> LinkedIncident {
        LinkedIncident {
            incident: CrimeIncident {
                id: format!("{block_group}-{date}"),
                date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
                primary_type: kind.to_owned(),
                community_area: Some(1),
                longitude: Some(-87.6),
                latitude: Some(41.8),
            },
            community: community.to_owned(),
            block_group: block_group.to_owned(),
        }
    }

    fn repeat(n: usize, date: &str, kind: &str, community: &str, bg: &str) -> Vec<LinkedIncident> {
        (0..n).map(|_| incident(date, kind, community, bg)).collect()
    }

    /// X: 10 in 2018, 15 in 2019; Y: 20 in 2018, 18 in 2019.
    fn ranking_data() -> Vec<LinkedIncident> {
        [
            repeat(10, "2018-03-01", "BATTERY", "LOOP", "X"),
            repeat(15, "2019-03-01", "BATTERY", "LOOP", "X"),
            repeat(20, "2018-03-01", "BATTERY", "DOUGLAS", "Y"),
            repeat(18, "2019-03-01", "BATTERY", "DOUGLAS", "Y"),
            repeat(50, "2019-03-01", "THEFT", "DOUGLAS", "Z"),
        ]
        .concat()
    }

    #[test]
    fn test_year_change() {
        let counts = BTreeMap::from([(2017, 200), (2018, 150)]);
        assert_eq!(year_change(&counts, 2017, 2018), Some(-0.25));
        assert_eq!(year_change(&counts, 2016, 2018), None);

        let counts = BTreeMap::from([(2017, 0), (2018, 150)]);
        assert_eq!(year_change(&counts, 2017, 2018), None);
    }

    #[test]
    fn test_change_overall_fills_years() {
        let data = [
            repeat(4, "2017-01-05", "THEFT", "LOOP", "A"),
            repeat(5, "2019-01-05", "THEFT", "LOOP", "A"),
        ]
        .concat();
        let change = change_overall(&data, 2017, 2019);
        assert_eq!(change.counts, BTreeMap::from([(2017, 4), (2018, 0), (2019, 5)]));
        assert_eq!(change.change, Some(0.25));
    }

    #[test]
    fn test_change_by_sorts_and_marks_undefined() {
        let data = [
            repeat(2, "2017-06-01", "THEFT", "LOOP", "A"),
            repeat(4, "2018-06-01", "THEFT", "LOOP", "A"),
            repeat(4, "2017-06-01", "ASSAULT", "LOOP", "A"),
            repeat(1, "2018-06-01", "ASSAULT", "LOOP", "A"),
            repeat(3, "2018-06-01", "ARSON", "LOOP", "A"),
        ]
        .concat();
        let changes = change_by(&data, 2017, 2018, Field::PrimaryType);
        let order: Vec<_> = changes
            .iter()
            .map(|c| (c.group.as_str(), c.change))
            .collect();
        assert_eq!(
            order,
            vec![("THEFT", Some(1.0)), ("ASSAULT", Some(-0.75)), ("ARSON", None)]
        );
        assert_eq!(changes[2].counts, BTreeMap::from([(2017, 0), (2018, 3)]));
    }

    #[test]
    fn test_rank_orders_by_last_year() {
        let data = ranking_data();
        let census = CensusTable::default();

        let first = rank_block_group(&data, &census, &[], "battery", 2018, 2019, 0).unwrap();
        assert_eq!(first.block_group, "Y");
        assert_eq!((first.count_min, first.count_max), (20, 18));
        assert_eq!(first.communities, vec!["DOUGLAS"]);

        let second = rank_block_group(&data, &census, &[], "BATTERY", 2018, 2019, 1).unwrap();
        assert_eq!(second.block_group, "X");
        assert_eq!((second.count_min, second.count_max), (10, 15));

        let err = rank_block_group(&data, &census, &[], "BATTERY", 2018, 2019, 2).unwrap_err();
        assert!(matches!(err, Error::RankOutOfRange { rank: 2, available: 2 }));
    }

    #[test]
    fn test_rank_reports_dominant_indicators() {
        let data = ranking_data();
        let themes = vec![Theme::race(), Theme::education()];
        let mut record = CensusRecord::new("Y");
        record.proportions.insert("race_black".into(), 0.81);
        record.proportions.insert("race_white".into(), 0.09);
        record.proportions.insert("educ_bachelors".into(), f64::NAN);
        record.proportions.insert("educ_highschool".into(), 0.3);
        let census = CensusTable {
            labels: Vec::new(),
            records: BTreeMap::from([("Y".to_owned(), record)]),
        };

        let unit = rank_block_group(&data, &census, &themes, "BATTERY", 2018, 2019, 0).unwrap();
        assert_eq!(
            unit.indicators,
            vec![
                Indicator {
                    theme: "race".into(),
                    label: "race_black".into(),
                    proportion: 0.81
                },
                Indicator {
                    theme: "education".into(),
                    label: "educ_highschool".into(),
                    proportion: 0.3
                },
            ]
        );

        // X has no census coverage.
        let unit = rank_block_group(&data, &census, &themes, "BATTERY", 2018, 2019, 1).unwrap();
        assert!(unit.indicators.is_empty());
    }

    #[test]
    fn test_probability_distribution() {
        let data = [
            repeat(3, "2018-01-01", "THEFT", "A", "1"),
            repeat(1, "2018-01-01", "THEFT", "B", "2"),
            repeat(7, "2018-01-01", "BATTERY", "B", "2"),
        ]
        .concat();
        let rows = probability(&data, Field::PrimaryType, "THEFT", Field::Community).unwrap();
        assert_eq!(
            rows,
            vec![
                ProbabilityRow {
                    group: "A".into(),
                    incidents: 3,
                    probability: 0.75
                },
                ProbabilityRow {
                    group: "B".into(),
                    incidents: 1,
                    probability: 0.25
                },
            ]
        );
        let sum: f64 = rows.iter().map(|r| r.probability).sum();
        assert!((sum - 1.0).abs() < 1e-12);

        assert_eq!(probability(&data, Field::PrimaryType, "ARSON", Field::Community), None);
    }

    #[test]
    fn test_week_ending_is_monday() {
        let monday = NaiveDate::from_ymd_opt(2019, 7, 1).unwrap();
        assert_eq!(week_ending(monday), monday);
        assert_eq!(week_ending(NaiveDate::from_ymd_opt(2019, 7, 2).unwrap()), NaiveDate::from_ymd_opt(2019, 7, 8).unwrap());
        assert_eq!(week_ending(NaiveDate::from_ymd_opt(2019, 6, 30).unwrap()), monday);
    }

    #[test]
    fn test_weekly_trend_fills_gaps() {
        let data = [
            repeat(2, "2019-07-01", "THEFT", "A", "1"),
            repeat(1, "2019-07-16", "THEFT", "A", "1"),
            repeat(9, "2019-07-09", "BATTERY", "A", "1"),
        ]
        .concat();
        let trend: Vec<_> = weekly_trend(&data, "theft")
            .iter()
            .map(|w| (w.week_ending.to_string(), w.incidents))
            .collect();
        assert_eq!(
            trend,
            vec![
                ("2019-07-01".to_owned(), 2),
                ("2019-07-08".to_owned(), 0),
                ("2019-07-15".to_owned(), 0),
                ("2019-07-22".to_owned(), 1),
            ]
        );
        assert!(weekly_trend(&data, "ARSON").is_empty());
    }

    #[test]
    fn test_in_month() {
        let data = [
            repeat(2, "2018-07-04", "THEFT", "A", "1"),
            repeat(3, "2018-08-04", "THEFT", "A", "1"),
            repeat(1, "2019-07-31", "THEFT", "A", "1"),
        ]
        .concat();
        let july = change_overall(in_month(&data, 7), 2018, 2019);
        assert_eq!(july.counts, BTreeMap::from([(2018, 2), (2019, 1)]));
        assert_eq!(july.change, Some(-0.5));
    }

    #[test]
    fn test_field_names() {
        assert_eq!("community".parse::<Field>().unwrap(), Field::Community);
        assert_eq!(Field::BlockGroup.to_string(), "block_group");
        assert!("ward".parse::<Field>().is_err());
    }
}

use chrono::{NaiveDate, NaiveDateTime};
use geo::{MultiPolygon, Point};

use crate::chicago::{RawCommunityArea, RawCrime};
use crate::error::{Error, Result};
use crate::geometry;

/// A named Chicago community area.
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityArea {
    pub number: u32,
    pub name: String,
    pub area: MultiPolygon<f64>,
}

impl TryFrom<RawCommunityArea> for CommunityArea {
    type Error = Error;

    fn try_from(raw: RawCommunityArea) -> Result<Self> {
        Ok(Self {
            number: area_number(&raw.area_num_1)?
                .ok_or_else(|| Error::Decode("community area without a number".into()))?,
            name: raw.community,
            area: geometry::area(&raw.the_geom)?,
        })
    }
}

/// Union of the census blocks sharing a 12 digit prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockGroup {
    pub id: String,
    pub area: MultiPolygon<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CrimeIncident {
    pub id: String,
    pub date: NaiveDate,
    pub primary_type: String,
    pub community_area: Option<u32>,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
}

impl CrimeIncident {
    pub fn year(&self) -> i32 {
        use chrono::Datelike;
        self.date.year()
    }

    /// `None` unless both coordinates are known.
    pub fn location(&self) -> Option<Point<f64>> {
        Some(Point::new(self.longitude?, self.latitude?))
    }
}

impl TryFrom<RawCrime> for CrimeIncident {
    type Error = Error;

    fn try_from(raw: RawCrime) -> Result<Self> {
        let (longitude, latitude) = match (blank(raw.longitude), blank(raw.latitude)) {
            (Some(lon), Some(lat)) => {
                let point = geometry::point(&lon, &lat)?;
                (Some(point.x()), Some(point.y()))
            }
            _ => (None, None),
        };
        Ok(Self {
            date: parse_date(&raw.date)?,
            community_area: match blank(raw.community_area) {
                Some(number) => area_number(&number)?,
                None => None,
            },
            id: raw.id,
            primary_type: raw.primary_type,
            longitude,
            latitude,
        })
    }
}

/// An incident that passed both the community area and the block group join.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkedIncident {
    pub incident: CrimeIncident,
    pub community: String,
    pub block_group: String,
}

impl LinkedIncident {
    pub fn year(&self) -> i32 {
        self.incident.year()
    }
}

/// Accepts the portal's timestamps (`2018-07-04T23:15:00.000`) and plain ISO dates.
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    let text = text.trim();
    NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|timestamp| timestamp.date())
        .or_else(|_| NaiveDate::parse_from_str(text, "%Y-%m-%d"))
        .map_err(|_| Error::Decode(format!("bad date {text:?}")))
}

fn area_number(text: &str) -> Result<Option<u32>> {
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }
    text.parse()
        .map(Some)
        .map_err(|_| Error::Decode(format!("bad community area number {text:?}")))
}

fn blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

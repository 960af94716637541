use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Column names the ACS API uses for the block group geography, in key order.
pub const LOCATION_COLUMNS: [&str; 4] = ["state", "county", "tract", "block group"];

/// One ACS variable: a raw code such as `B03002_003E` and the label it is published under.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub code: String,
    pub label: String,
}

impl Variable {
    pub fn new(code: &str, label: &str) -> Self {
        Self {
            code: code.to_owned(),
            label: label.to_owned(),
        }
    }
}

/// A demographic subject with its own denominator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Theme {
    pub name: String,
    // Total respondents; every category is divided by this.
    pub respondents: Variable,
    pub categories: Vec<Variable>,
}

impl Theme {
    /// Every code to request for this theme, respondents first.
    pub fn codes(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.respondents.code.as_str())
            .chain(self.categories.iter().map(|v| v.code.as_str()))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|v| v.label.as_str())
    }

    /// Race and ethnicity (B03002). Hispanic crosses the race categories.
    pub fn race() -> Self {
        Self {
            name: "race".to_owned(),
            respondents: Variable::new("B03002_001E", "race_respondents"),
            categories: vec![
                // non-Hispanic
                Variable::new("B03002_003E", "race_white"),
                Variable::new("B03002_004E", "race_black"),
                Variable::new("B03002_006E", "race_asian"),
                // any race
                Variable::new("B03002_012E", "race_hispanic"),
            ],
        }
    }

    /// Educational attainment (B15003).
    pub fn education() -> Self {
        Self {
            name: "education".to_owned(),
            respondents: Variable::new("B15003_001E", "educ_respondents"),
            categories: vec![
                Variable::new("B15003_017E", "educ_highschool"),
                Variable::new("B15003_018E", "educ_GED"),
                Variable::new("B15003_021E", "educ_associates"),
                Variable::new("B15003_022E", "educ_bachelors"),
                Variable::new("B15003_023E", "educ_masters"),
                Variable::new("B15003_024E", "educ_professional"),
                Variable::new("B15003_025E", "educ_doctorate"),
            ],
        }
    }

    /// Household income in the past 12 months (B19001).
    pub fn household_income() -> Self {
        let brackets = [
            ("B19001_002E", "hhinc_00_10K"),
            ("B19001_003E", "hhinc_10_15K"),
            ("B19001_004E", "hhinc_15_20K"),
            ("B19001_005E", "hhinc_20_25K"),
            ("B19001_006E", "hhinc_25_30K"),
            ("B19001_007E", "hhinc_30_35K"),
            ("B19001_008E", "hhinc_35_40K"),
            ("B19001_009E", "hhinc_40_45K"),
            ("B19001_010E", "hhinc_45_50K"),
            ("B19001_011E", "hhinc_50_60K"),
            ("B19001_012E", "hhinc_60_75K"),
            ("B19001_013E", "hhinc_75_100K"),
            ("B19001_014E", "hhinc_100_125K"),
            ("B19001_015E", "hhinc_125_150K"),
            ("B19001_016E", "hhinc_150_200K"),
        ];
        Self {
            name: "household_income".to_owned(),
            respondents: Variable::new("B19001_001E", "hhinc_respondents"),
            categories: brackets
                .iter()
                .map(|(code, label)| Variable::new(code, label))
                .collect(),
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![Self::race(), Self::education(), Self::household_income()]
    }
}

/// State, county, tract and block group digits of one ACS row.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LocationKey {
    pub state: String,
    pub county: String,
    pub tract: String,
    pub block_group: String,
}

impl LocationKey {
    pub fn new(state: &str, county: &str, tract: &str, block_group: &str) -> Self {
        Self {
            state: state.to_owned(),
            county: county.to_owned(),
            tract: tract.to_owned(),
            block_group: block_group.to_owned(),
        }
    }

    /// The 12 digit block group identifier, e.g. `170311234561`.
    pub fn block_group_id(&self) -> String {
        [
            self.state.as_str(),
            self.county.as_str(),
            self.tract.as_str(),
            self.block_group.as_str(),
        ]
        .concat()
    }
}

/// Demographic proportions of one block group.
///
/// A label missing from `proportions` means the block group had no row for
/// that theme. A NaN proportion means the theme's respondent total was zero.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CensusRecord {
    pub block_group: String,
    pub proportions: BTreeMap<String, f64>,
}

impl CensusRecord {
    pub fn new(block_group: &str) -> Self {
        Self {
            block_group: block_group.to_owned(),
            proportions: BTreeMap::new(),
        }
    }

    pub fn proportion(&self, label: &str) -> Option<f64> {
        self.proportions.get(label).copied()
    }

    /// The theme's category with the largest proportion, skipping absent and NaN values.
    ///
    /// Ties go to the category listed first in the theme.
    pub fn dominant<'a>(&self, theme: &'a Theme) -> Option<(&'a str, f64)> {
        theme
            .labels()
            .filter_map(|label| {
                self.proportion(label)
                    .filter(|value| !value.is_nan())
                    .map(|value| (label, value))
            })
            .fold(None, |best, (label, value)| match best {
                Some((_, top)) if top >= value => best,
                _ => Some((label, value)),
            })
    }
}

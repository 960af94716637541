use std::path::PathBuf;

use anyhow::Result;
use clap::{ArgAction, Parser};
use geo::Point;
use tracing_subscriber::EnvFilter;

use crimelink::analytics::{self, Field, GroupChange, YearChange};
use crimelink::chicago::Portal;
use crimelink::{Config, Datasets, Error, Pipeline, Request};

// 2111 S. Michigan Avenue
const S_MICHIGAN: (f64, f64) = (-87.623565, 41.854015);

/// Summarises Chicago crime by community area and census block group.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Inclusive lower bound year
    year_min: i32,
    /// Inclusive upper bound year
    year_max: i32,
    /// Comma delimited offense categories, e.g. "theft,criminal damage"
    crimes: String,
    /// Number of highest-incidence block groups to describe per category
    k: usize,
    /// Read previously compiled datasets instead of fetching them
    #[arg(long, default_value_t = false, action = ArgAction::Set)]
    cached: bool,
    /// JSON file overriding endpoints, paging, themes or cache locations
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    let crimes: Vec<String> = args.crimes.split(',').map(str::to_owned).collect();
    let request = Request::new(args.year_min, args.year_max, &crimes, args.k, args.cached)?;

    let portal = Portal::new(config.request_timeout())?;
    let pipeline = Pipeline::new(config, portal);
    let data = pipeline.compile(&request).await?;
    summarize(&data, &request, pipeline.config())?;
    println!("Finished!");
    Ok(())
}

fn summarize(data: &Datasets, request: &Request, config: &Config) -> Result<()> {
    let (year_min, year_max) = (request.year_min, request.year_max);
    let incidents = &data.incidents;

    println!("#### Summary statistics\n");
    print_change(&analytics::change_overall(incidents, year_min, year_max));
    for field in [Field::PrimaryType, Field::Community] {
        println!();
        print_group_changes(field, &analytics::change_by(incidents, year_min, year_max, field));
    }

    println!("\n#### Weekly incidence\n");
    for crime in &request.crimes {
        println!("{crime}");
        for week in analytics::weekly_trend(incidents, crime) {
            println!("  {}  {}", week.week_ending, week.incidents);
        }
    }

    println!("\n#### Block groups with the most incidents\n");
    for crime in &request.crimes {
        println!("#### {crime}\n");
        for k in 0..request.k {
            let unit = match analytics::rank_block_group(
                incidents,
                &data.census,
                &config.themes,
                crime,
                year_min,
                year_max,
                k,
            ) {
                Ok(unit) => unit,
                Err(Error::RankOutOfRange { available, .. }) => {
                    println!("  only {available} block groups reported {crime}\n");
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            println!(
                "{}, block group {}:\n  ranked no. {} for {} in {}\n  {}: {}\n  {}: {}",
                unit.communities.join(" / "),
                unit.block_group,
                k + 1,
                crime.to_lowercase(),
                year_max,
                year_max,
                unit.count_max,
                year_min,
                unit.count_min,
            );
            if unit.indicators.is_empty() {
                println!("  no census coverage");
            }
            for indicator in &unit.indicators {
                println!(
                    "  {}: {:.2}%",
                    indicator.label,
                    indicator.proportion * 100.0
                );
            }
            println!();
        }
    }

    println!("#### July only\n");
    print_change(&analytics::change_overall(
        analytics::in_month(incidents, 7),
        year_min,
        year_max,
    ));
    println!();
    print_group_changes(
        Field::PrimaryType,
        &analytics::change_by(analytics::in_month(incidents, 7), year_min, year_max, Field::PrimaryType),
    );

    println!("\n#### Probability of each offense at 2111 S. Michigan Avenue\n");
    let address = Point::new(S_MICHIGAN.0, S_MICHIGAN.1);
    match data.block_group_at(&address) {
        Some(block_group) => print_probability(analytics::probability(
            incidents,
            Field::BlockGroup,
            block_group,
            Field::PrimaryType,
        )),
        None => println!("  address is outside every block group"),
    }

    println!("\n#### Probability of theft by community\n");
    print_probability(analytics::probability(
        incidents,
        Field::PrimaryType,
        "THEFT",
        Field::Community,
    ));
    Ok(())
}

fn ratio(change: Option<f64>) -> String {
    change.map_or_else(|| "undefined".to_owned(), |c| format!("{c:.4}"))
}

fn print_change(change: &YearChange) {
    for (year, count) in &change.counts {
        println!("  {year}  {count}");
    }
    println!("  change  {}", ratio(change.change));
}

fn print_group_changes(field: Field, changes: &[GroupChange]) {
    println!("  {field}: counts by year, change");
    for group in changes {
        let counts: Vec<_> = group.counts.values().map(u64::to_string).collect();
        println!("  {}  {}  {}", group.group, counts.join("  "), ratio(group.change));
    }
}

fn print_probability(rows: Option<Vec<analytics::ProbabilityRow>>) {
    let Some(rows) = rows else {
        println!("  undefined: no matching incidents");
        return;
    };
    for row in &rows {
        println!("  {}  {}  {:.4}", row.group, row.incidents, row.probability);
    }
}

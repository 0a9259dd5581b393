use crate::models::{PricePoint, PriceSeries};
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;

/// External market data collaborator. Implementations must return dates in
/// ascending order with no duplicates and strictly positive closes; the
/// simulator re-validates and treats any violation as fatal for the run.
pub trait PriceProvider: Send + Sync {
    fn fetch_series<'a>(
        &'a self,
        ticker: &'a str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> BoxFuture<'a, Result<PriceSeries>>;
}

/// Reads `<dir>/<TICKER>.csv` files with a `date,close` header, one row per
/// trading day.
pub struct CsvDirProvider {
    dir: PathBuf,
}

impl CsvDirProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn load(&self, ticker: &str, start_date: NaiveDate, end_date: NaiveDate) -> Result<PriceSeries> {
        let path = self.dir.join(format!("{}.csv", ticker));
        let file = File::open(&path)
            .with_context(|| format!("no price file for {} at {}", ticker, path.display()))?;
        let reader = BufReader::new(file);

        let mut points = Vec::new();
        for (line_number, line) in reader.lines().enumerate() {
            let line = line.with_context(|| format!("failed reading {}", path.display()))?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if line_number == 0 && trimmed.to_ascii_lowercase().starts_with("date") {
                continue;
            }
            let mut fields = trimmed.split(',');
            let (raw_date, raw_close) = match (fields.next(), fields.next()) {
                (Some(date), Some(close)) => (date.trim(), close.trim()),
                _ => {
                    return Err(anyhow!(
                        "{} line {} must be date,close (value: {})",
                        path.display(),
                        line_number + 1,
                        trimmed
                    ))
                }
            };
            let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d").map_err(|_| {
                anyhow!(
                    "{} line {} has an invalid date (value: {})",
                    path.display(),
                    line_number + 1,
                    raw_date
                )
            })?;
            let close: f64 = raw_close.parse().map_err(|_| {
                anyhow!(
                    "{} line {} has an invalid close (value: {})",
                    path.display(),
                    line_number + 1,
                    raw_close
                )
            })?;
            if date >= start_date && date <= end_date {
                points.push(PricePoint { date, close });
            }
        }

        if points.is_empty() {
            return Err(anyhow!(
                "{} has no rows between {} and {}",
                path.display(),
                start_date,
                end_date
            ));
        }

        Ok(PriceSeries::new(ticker, points))
    }
}

impl PriceProvider for CsvDirProvider {
    fn fetch_series<'a>(
        &'a self,
        ticker: &'a str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> BoxFuture<'a, Result<PriceSeries>> {
        Box::pin(async move { self.load(ticker, start_date, end_date) })
    }
}

/// Deterministic in-memory provider for tests and synthetic fixtures.
#[derive(Default)]
pub struct InMemoryProvider {
    series: HashMap<String, PriceSeries>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, series: PriceSeries) -> Self {
        self.series.insert(series.ticker.clone(), series);
        self
    }

    pub fn insert(&mut self, series: PriceSeries) {
        self.series.insert(series.ticker.clone(), series);
    }
}

impl PriceProvider for InMemoryProvider {
    fn fetch_series<'a>(
        &'a self,
        ticker: &'a str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> BoxFuture<'a, Result<PriceSeries>> {
        Box::pin(async move {
            let series = self
                .series
                .get(ticker)
                .ok_or_else(|| anyhow!("unknown ticker {}", ticker))?;
            let points: Vec<PricePoint> = series
                .points
                .iter()
                .copied()
                .filter(|point| point.date >= start_date && point.date <= end_date)
                .collect();
            if points.is_empty() {
                return Err(anyhow!(
                    "no data for {} between {} and {}",
                    ticker,
                    start_date,
                    end_date
                ));
            }
            Ok(PriceSeries::new(ticker, points))
        })
    }
}

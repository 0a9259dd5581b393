use crate::error::SimulationError;
use crate::models::PriceSeries;
use chrono::NaiveDate;
use log::info;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Price data for the whole universe, aligned to the trading days present in
/// every requested series. Days missing from any series are skipped entirely;
/// that is a gap policy, not an error, unless fewer than two usable days
/// remain.
#[derive(Debug, Clone)]
pub struct MarketData {
    tickers: Vec<String>,
    dates: Vec<NaiveDate>,
    closes: BTreeMap<String, Vec<f64>>,
}

impl MarketData {
    pub fn align(series: Vec<PriceSeries>) -> Result<Self, SimulationError> {
        let mut common: Option<BTreeSet<NaiveDate>> = None;
        for item in &series {
            let dates: BTreeSet<NaiveDate> = item.points.iter().map(|p| p.date).collect();
            common = Some(match common {
                Some(current) => current.intersection(&dates).copied().collect(),
                None => dates,
            });
        }
        let dates: Vec<NaiveDate> = common.unwrap_or_default().into_iter().collect();

        if dates.len() < 2 {
            return Err(SimulationError::InsufficientHistory(format!(
                "only {} trading day(s) are common to all {} series; at least 2 are required",
                dates.len(),
                series.len()
            )));
        }

        let mut tickers = Vec::with_capacity(series.len());
        let mut closes = BTreeMap::new();
        for item in series {
            let by_date: HashMap<NaiveDate, f64> =
                item.points.iter().map(|p| (p.date, p.close)).collect();
            let aligned: Vec<f64> = dates.iter().map(|date| by_date[date]).collect();
            tickers.push(item.ticker.clone());
            closes.insert(item.ticker, aligned);
        }
        tickers.sort();

        info!(
            "Aligned {} tickers over {} common trading days ({} to {})",
            tickers.len(),
            dates.len(),
            dates[0],
            dates[dates.len() - 1]
        );

        Ok(Self {
            tickers,
            dates,
            closes,
        })
    }

    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn day_count(&self) -> usize {
        self.dates.len()
    }

    /// Closing price for a ticker on an aligned day index. Valid for every
    /// ticker/index pair by construction.
    pub fn close(&self, ticker: &str, day_index: usize) -> f64 {
        self.closes[ticker][day_index]
    }

    /// Closes from the first aligned day through `day_index`, inclusive.
    pub fn closes_up_to(&self, ticker: &str, day_index: usize) -> &[f64] {
        &self.closes[ticker][..=day_index]
    }
}

use crate::models::{Trade, TradeAction};
use anyhow::{anyhow, Result};
use chrono::NaiveDate;

const HEADER: &str = "date,ticker,action,quantity,price,value,reason";

/// Renders the trade log as CSV, one row per trade. The free-text reason
/// field is quoted so embedded commas and quotes survive a round trip.
pub fn trades_to_csv(trades: &[Trade]) -> String {
    let mut out = String::from(HEADER);
    out.push('\n');
    for trade in trades {
        out.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            trade.date,
            quote_field(&trade.ticker),
            trade.action.as_str(),
            trade.quantity,
            trade.price,
            trade.value,
            quote_field(&trade.reason)
        ));
    }
    out
}

fn quote_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Parses CSV produced by `trades_to_csv`. Trade ids are not exported, so
/// rows are renumbered sequentially.
pub fn parse_trades_csv(text: &str) -> Result<Vec<Trade>> {
    let mut trades = Vec::new();
    for (line_number, line) in text.lines().enumerate() {
        if line_number == 0 || line.trim().is_empty() {
            continue;
        }
        let fields = split_csv_line(line)?;
        if fields.len() != 7 {
            return Err(anyhow!(
                "line {} has {} fields, expected 7",
                line_number + 1,
                fields.len()
            ));
        }
        let date = NaiveDate::parse_from_str(&fields[0], "%Y-%m-%d")
            .map_err(|_| anyhow!("line {} has an invalid date {}", line_number + 1, fields[0]))?;
        let action: TradeAction = fields[2].parse()?;
        let quantity: f64 = fields[3]
            .parse()
            .map_err(|_| anyhow!("line {} has an invalid quantity", line_number + 1))?;
        let price: f64 = fields[4]
            .parse()
            .map_err(|_| anyhow!("line {} has an invalid price", line_number + 1))?;
        let value: f64 = fields[5]
            .parse()
            .map_err(|_| anyhow!("line {} has an invalid value", line_number + 1))?;
        trades.push(Trade {
            id: trades.len() as u64 + 1,
            date,
            ticker: fields[1].clone(),
            action,
            quantity,
            price,
            value,
            reason: fields[6].clone(),
        });
    }
    Ok(trades)
}

fn split_csv_line(line: &str) -> Result<Vec<String>> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current));
            }
            other => current.push(other),
        }
    }
    if in_quotes {
        return Err(anyhow!("unterminated quote in line: {}", line));
    }
    fields.push(current);
    Ok(fields)
}

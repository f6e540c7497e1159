//! Built-in operation catalogue.
//!
//! Operations are grouped by domain, one file per domain. Order matters: the
//! direct tools listing exposes the first N operations, so the most commonly
//! used ones come first.

mod analysis;
mod fundamentals;
mod market_data;
mod reference;
mod technical;

use serde_json::json;

use super::{Operation, ParamKind, ParamSpec};

/// Every built-in operation, in listing order.
#[must_use]
pub fn builtin_operations() -> Vec<Operation> {
    let mut operations = Vec::new();
    operations.extend(market_data::operations());
    operations.extend(reference::operations());
    operations.extend(fundamentals::operations());
    operations.extend(analysis::operations());
    operations.extend(technical::operations());
    operations
}

const INTERVALS: &[&str] = &[
    "1min", "5min", "15min", "30min", "45min", "1h", "2h", "4h", "8h", "1day", "1week", "1month",
];

fn symbol() -> ParamSpec {
    ParamSpec::query(
        "symbol",
        ParamKind::String,
        "Instrument symbol, e.g. AAPL, EUR/USD, BTC/USD",
    )
    .required()
}

fn interval() -> ParamSpec {
    ParamSpec::query(
        "interval",
        ParamKind::String,
        "Interval between two consecutive points in the series",
    )
    .required()
    .one_of(INTERVALS)
}

/// Optional identifiers and filters that disambiguate a symbol.
fn instrument_filters() -> Vec<ParamSpec> {
    vec![
        ParamSpec::query("figi", ParamKind::String, "Financial Instrument Global Identifier"),
        ParamSpec::query("isin", ParamKind::String, "International Securities Identification Number"),
        ParamSpec::query("cusip", ParamKind::String, "CUSIP number"),
        ParamSpec::query("exchange", ParamKind::String, "Exchange name or code, e.g. NASDAQ"),
        ParamSpec::query("mic_code", ParamKind::String, "Market Identifier Code (ISO 10383)"),
        ParamSpec::query("country", ParamKind::String, "Country name or ISO code"),
    ]
}

fn instrument_type() -> ParamSpec {
    ParamSpec::query("type", ParamKind::String, "Instrument type, e.g. Common Stock, ETF")
}

fn outputsize(description: &'static str) -> ParamSpec {
    ParamSpec::query("outputsize", ParamKind::Integer, description)
}

fn timezone() -> ParamSpec {
    ParamSpec::query(
        "timezone",
        ParamKind::String,
        "Timezone for timestamps: Exchange, UTC or an IANA name",
    )
}

/// `start_date`, `end_date` and `date` range filters.
fn date_range() -> Vec<ParamSpec> {
    vec![
        ParamSpec::query("start_date", ParamKind::String, "Start of the range, YYYY-MM-DD or YYYY-MM-DD hh:mm:ss"),
        ParamSpec::query("end_date", ParamKind::String, "End of the range, YYYY-MM-DD or YYYY-MM-DD hh:mm:ss"),
        ParamSpec::query("date", ParamKind::String, "Single date, or 'today' / 'yesterday'"),
    ]
}

fn order() -> ParamSpec {
    ParamSpec::query("order", ParamKind::String, "Sort order of the output").one_of(&["asc", "desc"])
}

fn decimal_places() -> ParamSpec {
    ParamSpec::query("dp", ParamKind::Integer, "Number of decimal places in floating values")
}

fn prepost() -> ParamSpec {
    ParamSpec::query("prepost", ParamKind::Boolean, "Include pre- and post-market data")
}

fn time_period(default: i64) -> ParamSpec {
    ParamSpec::query("time_period", ParamKind::Integer, "Number of periods to average over")
        .default_value(json!(default))
}

fn series_type() -> ParamSpec {
    ParamSpec::query("series_type", ParamKind::String, "Price series used in the calculation")
        .one_of(&["open", "high", "low", "close", "volume"])
        .default_value(json!("close"))
}

fn period() -> ParamSpec {
    ParamSpec::query("period", ParamKind::String, "Reporting period").one_of(&["annual", "quarterly"])
}

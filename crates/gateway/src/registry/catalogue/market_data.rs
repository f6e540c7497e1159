//! Prices, quotes and historical series.

use market_router_core::Tier;
use serde_json::json;

use super::{
    date_range, decimal_places, instrument_filters, instrument_type, interval, order,
    outputsize, prepost, symbol, timezone,
};
use crate::registry::{Operation, OutputShape, ParamKind, ParamSpec};

pub(super) fn operations() -> Vec<Operation> {
    vec![
        Operation::new(
            "GetTimeSeries",
            "time_series",
            "Historical and intraday OHLCV time series (open, high, low, close, volume) for \
             stocks, forex pairs, cryptocurrencies, ETFs and indices at a chosen interval.",
        )
        .param(symbol())
        .param(interval())
        .params(instrument_filters())
        .param(instrument_type())
        .param(outputsize("Number of data points to return, 1 to 5000 (default 30)"))
        .param(timezone())
        .params(date_range())
        .param(order())
        .param(prepost())
        .param(decimal_places())
        .param(ParamSpec::query("previous_close", ParamKind::Boolean, "Include the previous close in each row"))
        .param(ParamSpec::query("adjust", ParamKind::String, "Adjustment mode").one_of(&["all", "splits", "dividends", "none"]))
        .output(OutputShape::object(&["meta", "values"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetPrice",
            "price",
            "Latest real-time price of an instrument, a single number with minimal latency.",
        )
        .param(symbol())
        .params(instrument_filters())
        .param(instrument_type())
        .param(prepost())
        .param(decimal_places())
        .output(OutputShape::object(&["price"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetQuote",
            "quote",
            "Latest quote: open, high, low, close, volume, 52-week range, change and percent \
             change for the current trading session.",
        )
        .param(symbol())
        .param(ParamSpec::query("interval", ParamKind::String, "Interval of the quote").one_of(super::INTERVALS).default_value(json!("1day")))
        .params(instrument_filters())
        .param(instrument_type())
        .param(ParamSpec::query("volume_time_period", ParamKind::Integer, "Periods for the average volume"))
        .param(prepost())
        .param(ParamSpec::query("eod", ParamKind::Boolean, "Return the last closed trading day"))
        .param(ParamSpec::query("rolling_period", ParamKind::Integer, "Hours for the rolling change (crypto)"))
        .param(decimal_places())
        .param(timezone())
        .output(OutputShape::object(&["symbol"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetEod",
            "eod",
            "End-of-day closing price for an instrument, optionally for a specific date.",
        )
        .param(symbol())
        .params(instrument_filters())
        .param(instrument_type())
        .param(ParamSpec::query("date", ParamKind::String, "Trading date, YYYY-MM-DD"))
        .param(prepost())
        .param(decimal_places())
        .output(OutputShape::object(&["close"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetExchangeRate",
            "exchange_rate",
            "Real-time exchange rate for a currency pair or cryptocurrency pair.",
        )
        .param(ParamSpec::query("symbol", ParamKind::String, "Currency pair, e.g. EUR/USD").required())
        .param(ParamSpec::query("date", ParamKind::String, "Historical date, YYYY-MM-DD"))
        .param(decimal_places())
        .param(timezone())
        .output(OutputShape::object(&["rate"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetCurrencyConversion",
            "currency_conversion",
            "Convert an amount from one currency or cryptocurrency into another at the \
             real-time exchange rate.",
        )
        .param(ParamSpec::query("symbol", ParamKind::String, "Currency pair, e.g. USD/JPY").required())
        .param(ParamSpec::query("amount", ParamKind::Number, "Amount of the base currency").required())
        .param(ParamSpec::query("date", ParamKind::String, "Historical date, YYYY-MM-DD"))
        .param(decimal_places())
        .param(timezone())
        .output(OutputShape::object(&["rate", "amount"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetMarketMovers",
            "market_movers/{market}",
            "Top gaining or losing instruments today (market movers) in a market segment.",
        )
        .param(ParamSpec::path("market", "Market segment").one_of(&["stocks", "etf", "mutual_funds", "forex", "crypto"]))
        .param(ParamSpec::query("direction", ParamKind::String, "Gainers or losers").one_of(&["gainers", "losers"]).default_value(json!("gainers")))
        .param(outputsize("Number of instruments to return, 1 to 50"))
        .param(ParamSpec::query("country", ParamKind::String, "Country filter (stocks only)"))
        .param(ParamSpec::query("price_greater_than", ParamKind::String, "Only instruments above this price"))
        .param(decimal_places())
        .output(OutputShape::object(&["values"]))
        .tier(Tier::Pro),
        Operation::new(
            "GetTimeSeriesCross",
            "time_series/cross",
            "Synthetic cross-rate time series between two arbitrary instruments, e.g. a stock \
             priced in a different currency.",
        )
        .param(ParamSpec::query("base", ParamKind::String, "Base instrument symbol").required())
        .param(ParamSpec::query("quote", ParamKind::String, "Quote instrument symbol").required())
        .param(interval())
        .param(outputsize("Number of data points to return"))
        .params(date_range())
        .param(timezone())
        .param(order())
        .param(decimal_places())
        .output(OutputShape::object(&["meta", "values"]))
        .tier(Tier::Pro),
        Operation::new(
            "GetMarketState",
            "market_state",
            "Whether exchanges are currently open or closed, with time until the next open or close.",
        )
        .param(ParamSpec::query("exchange", ParamKind::String, "Exchange name"))
        .param(ParamSpec::query("code", ParamKind::String, "Market Identifier Code"))
        .param(ParamSpec::query("country", ParamKind::String, "Country name"))
        .output(OutputShape::array())
        .tier(Tier::Basic),
    ]
}

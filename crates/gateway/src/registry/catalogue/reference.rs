//! Reference data: instrument lists, exchanges, symbol search.

use market_router_core::Tier;

use super::{interval, outputsize, symbol};
use crate::registry::{Operation, OutputShape, ParamKind, ParamSpec};

fn listing_filters() -> Vec<ParamSpec> {
    vec![
        ParamSpec::query("symbol", ParamKind::String, "Filter by symbol"),
        ParamSpec::query("figi", ParamKind::String, "Filter by FIGI"),
        ParamSpec::query("isin", ParamKind::String, "Filter by ISIN"),
        ParamSpec::query("cusip", ParamKind::String, "Filter by CUSIP"),
        ParamSpec::query("exchange", ParamKind::String, "Filter by exchange name"),
        ParamSpec::query("mic_code", ParamKind::String, "Filter by Market Identifier Code"),
        ParamSpec::query("country", ParamKind::String, "Filter by country"),
    ]
}

fn show_plan() -> ParamSpec {
    ParamSpec::query(
        "show_plan",
        ParamKind::Boolean,
        "Include the plan each instrument is available on",
    )
}

pub(super) fn operations() -> Vec<Operation> {
    vec![
        Operation::new(
            "GetSymbolSearch",
            "symbol_search",
            "Search instruments by symbol or company name and return the best matching tickers \
             across exchanges.",
        )
        .param(ParamSpec::query("symbol", ParamKind::String, "Symbol or name to search for").required())
        .param(outputsize("Number of matches to return, 1 to 120"))
        .param(show_plan())
        .output(OutputShape::object(&["data"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetStocks",
            "stocks",
            "List of stocks (equities) available, filterable by exchange, country and type.",
        )
        .params(listing_filters())
        .param(ParamSpec::query("type", ParamKind::String, "Instrument type, e.g. Common Stock"))
        .param(show_plan())
        .param(ParamSpec::query("include_delisted", ParamKind::Boolean, "Include delisted stocks"))
        .output(OutputShape::object(&["data"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetForexPairs",
            "forex_pairs",
            "List of available forex (currency) pairs with base and quote currencies.",
        )
        .param(ParamSpec::query("symbol", ParamKind::String, "Filter by pair, e.g. EUR/USD"))
        .param(ParamSpec::query("currency_base", ParamKind::String, "Filter by base currency"))
        .param(ParamSpec::query("currency_quote", ParamKind::String, "Filter by quote currency"))
        .output(OutputShape::object(&["data"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetCryptocurrencies",
            "cryptocurrencies",
            "List of available cryptocurrency pairs and the exchanges they trade on.",
        )
        .param(ParamSpec::query("symbol", ParamKind::String, "Filter by pair, e.g. BTC/USD"))
        .param(ParamSpec::query("exchange", ParamKind::String, "Filter by crypto exchange"))
        .param(ParamSpec::query("currency_base", ParamKind::String, "Filter by base currency"))
        .param(ParamSpec::query("currency_quote", ParamKind::String, "Filter by quote currency"))
        .output(OutputShape::object(&["data"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetEtfs",
            "etfs",
            "List of exchange-traded funds (ETFs) available.",
        )
        .params(listing_filters())
        .param(show_plan())
        .param(ParamSpec::query("include_delisted", ParamKind::Boolean, "Include delisted ETFs"))
        .output(OutputShape::object(&["data"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetFunds",
            "funds",
            "List of mutual funds available.",
        )
        .params(listing_filters())
        .param(show_plan())
        .param(ParamSpec::query("page", ParamKind::Integer, "Page number"))
        .param(outputsize("Funds per page"))
        .output(OutputShape::object(&["result"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetBonds",
            "bonds",
            "List of government and corporate bonds available.",
        )
        .param(ParamSpec::query("symbol", ParamKind::String, "Filter by symbol"))
        .param(ParamSpec::query("exchange", ParamKind::String, "Filter by exchange"))
        .param(ParamSpec::query("country", ParamKind::String, "Filter by country"))
        .param(ParamSpec::query("page", ParamKind::Integer, "Page number"))
        .param(outputsize("Bonds per page"))
        .output(OutputShape::object(&["result"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetCommodities",
            "commodities",
            "List of commodities (metals, energy, agriculture) available.",
        )
        .param(ParamSpec::query("symbol", ParamKind::String, "Filter by symbol"))
        .param(ParamSpec::query("category", ParamKind::String, "Filter by category"))
        .output(OutputShape::object(&["data"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetExchanges",
            "exchanges",
            "List of stock and ETF exchanges with their codes, countries and time zones.",
        )
        .param(ParamSpec::query("type", ParamKind::String, "Instrument type traded on the exchange"))
        .param(ParamSpec::query("name", ParamKind::String, "Filter by exchange name"))
        .param(ParamSpec::query("code", ParamKind::String, "Filter by MIC code"))
        .param(ParamSpec::query("country", ParamKind::String, "Filter by country"))
        .param(show_plan())
        .output(OutputShape::object(&["data"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetCryptocurrencyExchanges",
            "cryptocurrency_exchanges",
            "List of cryptocurrency exchanges available.",
        )
        .output(OutputShape::object(&["data"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetExchangeSchedule",
            "exchange_schedule",
            "Trading hours and sessions of exchanges, including pre- and post-market sessions.",
        )
        .param(ParamSpec::query("mic_name", ParamKind::String, "Filter by exchange name"))
        .param(ParamSpec::query("mic_code", ParamKind::String, "Filter by MIC code"))
        .param(ParamSpec::query("country", ParamKind::String, "Filter by country"))
        .param(ParamSpec::query("date", ParamKind::String, "Date of the schedule, YYYY-MM-DD"))
        .output(OutputShape::object(&["data"]))
        .tier(Tier::Ultra),
        Operation::new(
            "GetCountries",
            "countries",
            "List of countries with ISO codes, capitals and currencies.",
        )
        .output(OutputShape::object(&["data"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetInstrumentType",
            "instrument_type",
            "List of instrument types (asset classes) available.",
        )
        .output(OutputShape::object(&["result"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetEarliestTimestamp",
            "earliest_timestamp",
            "First available date of historical data for an instrument at an interval.",
        )
        .param(symbol())
        .param(interval())
        .param(ParamSpec::query("exchange", ParamKind::String, "Exchange name"))
        .param(ParamSpec::query("mic_code", ParamKind::String, "Market Identifier Code"))
        .param(ParamSpec::query("timezone", ParamKind::String, "Timezone for the result"))
        .output(OutputShape::object(&["datetime"]))
        .tier(Tier::Basic),
    ]
}

//! Technical indicators computed over a time series.
//!
//! Every indicator shares the time-series parameters (symbol, interval,
//! range, output size) and adds its own tuning parameters.

use market_router_core::Tier;
use serde_json::json;

use super::{
    date_range, decimal_places, instrument_filters, interval, order, outputsize, prepost,
    series_type, symbol, time_period, timezone,
};
use crate::registry::{Operation, OutputShape, ParamKind, ParamSpec};

fn indicator(
    id: &'static str,
    path: &'static str,
    description: &'static str,
    extra: Vec<ParamSpec>,
) -> Operation {
    Operation::new(id, path, description)
        .param(symbol())
        .param(interval())
        .params(instrument_filters())
        .param(outputsize("Number of data points to return, 1 to 5000 (default 30)"))
        .param(timezone())
        .params(date_range())
        .param(order())
        .param(prepost())
        .param(decimal_places())
        .params(extra)
        .output(OutputShape::object(&["meta", "values"]))
        .tier(Tier::Basic)
}

fn integer(name: &'static str, description: &'static str, default: i64) -> ParamSpec {
    ParamSpec::query(name, ParamKind::Integer, description).default_value(json!(default))
}

fn number(name: &'static str, description: &'static str, default: f64) -> ParamSpec {
    ParamSpec::query(name, ParamKind::Number, description).default_value(json!(default))
}

fn ma_type() -> ParamSpec {
    ParamSpec::query("ma_type", ParamKind::String, "Moving average type")
        .one_of(&["SMA", "EMA", "WMA", "DEMA", "TEMA", "TRIMA", "KAMA", "MAMA", "T3MA"])
        .default_value(json!("SMA"))
}

#[allow(clippy::too_many_lines)]
pub(super) fn operations() -> Vec<Operation> {
    vec![
        indicator(
            "GetRsi",
            "rsi",
            "Relative Strength Index (RSI) momentum oscillator measuring overbought and \
             oversold conditions on a 0-100 scale.",
            vec![time_period(14), series_type()],
        ),
        indicator(
            "GetMacd",
            "macd",
            "Moving Average Convergence Divergence (MACD) trend-following momentum indicator \
             with signal line and histogram.",
            vec![
                integer("fast_period", "Fast EMA period", 12),
                integer("slow_period", "Slow EMA period", 26),
                integer("signal_period", "Signal line period", 9),
                series_type(),
            ],
        ),
        indicator(
            "GetSma",
            "sma",
            "Simple Moving Average (SMA) of the price over a number of periods.",
            vec![time_period(9), series_type()],
        ),
        indicator(
            "GetEma",
            "ema",
            "Exponential Moving Average (EMA) weighting recent prices more heavily.",
            vec![time_period(9), series_type()],
        ),
        indicator(
            "GetWma",
            "wma",
            "Weighted Moving Average (WMA) with linearly increasing weights.",
            vec![time_period(9), series_type()],
        ),
        indicator(
            "GetBbands",
            "bbands",
            "Bollinger Bands volatility envelope: moving average with upper and lower bands at \
             a number of standard deviations.",
            vec![
                time_period(20),
                number("sd", "Number of standard deviations", 2.0),
                ma_type(),
                series_type(),
            ],
        ),
        indicator(
            "GetAtr",
            "atr",
            "Average True Range (ATR) volatility indicator.",
            vec![time_period(14)],
        ),
        indicator(
            "GetAdx",
            "adx",
            "Average Directional Index (ADX) measuring trend strength.",
            vec![time_period(14)],
        ),
        indicator(
            "GetCci",
            "cci",
            "Commodity Channel Index (CCI) identifying cyclical turns.",
            vec![time_period(20)],
        ),
        indicator(
            "GetStoch",
            "stoch",
            "Stochastic oscillator comparing the close to the high-low range over a period.",
            vec![
                integer("fast_k_period", "Fast %K period", 14),
                integer("slow_k_period", "Slow %K period", 1),
                integer("slow_d_period", "Slow %D period", 3),
                ParamSpec::query("slow_kma_type", ParamKind::String, "Slow %K moving average type")
                    .default_value(json!("SMA")),
                ParamSpec::query("slow_dma_type", ParamKind::String, "Slow %D moving average type")
                    .default_value(json!("SMA")),
            ],
        ),
        indicator(
            "GetObv",
            "obv",
            "On Balance Volume (OBV) relating volume flow to price changes.",
            vec![series_type()],
        ),
        indicator(
            "GetVwap",
            "vwap",
            "Volume Weighted Average Price (VWAP) for intraday series.",
            vec![
                ParamSpec::query("sd_time_period", ParamKind::Integer, "Period for the standard deviation bands"),
                ParamSpec::query("sd", ParamKind::Number, "Number of standard deviations for the bands"),
            ],
        ),
        indicator(
            "GetMfi",
            "mfi",
            "Money Flow Index (MFI) volume-weighted RSI.",
            vec![time_period(14)],
        ),
        indicator(
            "GetWillr",
            "willr",
            "Williams %R momentum indicator.",
            vec![time_period(14)],
        ),
        indicator(
            "GetMom",
            "mom",
            "Momentum (MOM): price change over a number of periods.",
            vec![time_period(9), series_type()],
        ),
        indicator(
            "GetRoc",
            "roc",
            "Rate of Change (ROC) percentage price change over a number of periods.",
            vec![time_period(9), series_type()],
        ),
        indicator(
            "GetAroon",
            "aroon",
            "Aroon indicator identifying trend changes and strength.",
            vec![time_period(14)],
        ),
        indicator(
            "GetSar",
            "sar",
            "Parabolic SAR (stop and reverse) trailing stop indicator.",
            vec![
                number("acceleration", "Acceleration factor", 0.02),
                number("maximum", "Maximum acceleration", 0.2),
            ],
        ),
        indicator(
            "GetSupertrend",
            "supertrend",
            "Supertrend trend-following indicator based on ATR bands.",
            vec![
                integer("period", "ATR period", 10),
                integer("multiplier", "ATR multiplier", 3),
            ],
        ),
        indicator(
            "GetPercentB",
            "percent_b",
            "%B indicator: position of the price relative to the Bollinger Bands.",
            vec![
                time_period(20),
                number("sd", "Number of standard deviations", 2.0),
                ma_type(),
                series_type(),
            ],
        ),
    ]
}

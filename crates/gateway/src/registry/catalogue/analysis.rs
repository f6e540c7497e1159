//! Analyst estimates, recommendations and price targets.

use market_router_core::Tier;

use super::{instrument_filters, symbol};
use crate::registry::{Operation, OutputShape, ParamKind, ParamSpec};

fn analysis(
    id: &'static str,
    path: &'static str,
    description: &'static str,
    key: &'static [&'static str],
    tier: Tier,
) -> Operation {
    Operation::new(id, path, description)
        .param(symbol())
        .params(instrument_filters())
        .output(OutputShape::object(key))
        .tier(tier)
}

pub(super) fn operations() -> Vec<Operation> {
    vec![
        analysis(
            "GetEarningsEstimate",
            "earnings_estimate",
            "Analysts' consensus earnings per share (EPS) estimates for upcoming quarters and years.",
            &["earnings_estimate"],
            Tier::Ultra,
        ),
        analysis(
            "GetRevenueEstimate",
            "revenue_estimate",
            "Analysts' consensus revenue estimates for upcoming quarters and years.",
            &["revenue_estimate"],
            Tier::Ultra,
        ),
        analysis(
            "GetEpsTrend",
            "eps_trend",
            "How consensus EPS estimates changed over the last 7, 30, 60 and 90 days.",
            &["eps_trend"],
            Tier::Ultra,
        ),
        analysis(
            "GetEpsRevisions",
            "eps_revisions",
            "Number of upward and downward analyst EPS revisions over the last week and month.",
            &["eps_revision"],
            Tier::Ultra,
        ),
        analysis(
            "GetGrowthEstimates",
            "growth_estimates",
            "Consensus growth estimates for the company compared with its industry and sector.",
            &["growth_estimates"],
            Tier::Ultra,
        ),
        analysis(
            "GetRecommendations",
            "recommendations",
            "Aggregated analyst buy, hold and sell recommendations with an overall rating.",
            &["trends"],
            Tier::Ultra,
        ),
        analysis(
            "GetPriceTarget",
            "price_target",
            "Analysts' price targets for a stock: high, median, low and average target price.",
            &["price_target"],
            Tier::Ultra,
        ),
        analysis(
            "GetAnalystRatingsLight",
            "analyst_ratings/light",
            "Recent analyst rating changes (upgrades, downgrades) with firm names.",
            &["ratings"],
            Tier::Grow,
        )
        .param(ParamSpec::query("rating_change", ParamKind::String, "Filter by change").one_of(&["Maintains", "Upgrade", "Downgrade", "Initiates", "Reiterates"]))
        .param(ParamSpec::query("outputsize", ParamKind::Integer, "Number of ratings to return")),
        analysis(
            "GetAnalystRatingsUsEquities",
            "analyst_ratings/us_equities",
            "Detailed analyst ratings for US equities including price target changes.",
            &["ratings"],
            Tier::Ultra,
        )
        .param(ParamSpec::query("rating_change", ParamKind::String, "Filter by change").one_of(&["Maintains", "Upgrade", "Downgrade", "Initiates", "Reiterates"]))
        .param(ParamSpec::query("outputsize", ParamKind::Integer, "Number of ratings to return")),
    ]
}

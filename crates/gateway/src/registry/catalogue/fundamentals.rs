//! Company fundamentals, corporate actions and financial statements.

use market_router_core::Tier;

use super::{date_range, instrument_filters, outputsize, period, symbol};
use crate::registry::{Operation, OutputShape, ParamKind, ParamSpec};

fn company(
    id: &'static str,
    path: &'static str,
    description: &'static str,
    output: OutputShape,
    tier: Tier,
) -> Operation {
    Operation::new(id, path, description)
        .param(symbol())
        .params(instrument_filters())
        .output(output)
        .tier(tier)
}

fn statement(id: &'static str, path: &'static str, description: &'static str, key: &'static [&'static str]) -> Operation {
    company(id, path, description, OutputShape::object(key), Tier::Pro)
        .param(period())
        .param(ParamSpec::query("start_date", ParamKind::String, "First reporting date, YYYY-MM-DD"))
        .param(ParamSpec::query("end_date", ParamKind::String, "Last reporting date, YYYY-MM-DD"))
}

pub(super) fn operations() -> Vec<Operation> {
    vec![
        company(
            "GetLogo",
            "logo",
            "Logo image URL of a company, cryptocurrency or forex pair.",
            OutputShape::object(&["url"]),
            Tier::Basic,
        ),
        company(
            "GetProfile",
            "profile",
            "Company profile: sector, industry, employees, website, CEO and business description.",
            OutputShape::object(&["symbol"]),
            Tier::Grow,
        ),
        company(
            "GetStatistics",
            "statistics",
            "Key statistics: valuation ratios (P/E, PEG), margins, market capitalization, \
             shares outstanding, dividends and 52-week stock price summary.",
            OutputShape::object(&["statistics"]),
            Tier::Pro,
        ),
        company(
            "GetDividends",
            "dividends",
            "Historical dividend payments of a stock with ex-dividend dates and amounts.",
            OutputShape::object(&["dividends"]),
            Tier::Grow,
        )
        .param(ParamSpec::query("range", ParamKind::String, "Preset range").one_of(&["last", "next", "1m", "3m", "6m", "ytd", "1y", "2y", "5y", "full"]))
        .param(ParamSpec::query("start_date", ParamKind::String, "Start date, YYYY-MM-DD"))
        .param(ParamSpec::query("end_date", ParamKind::String, "End date, YYYY-MM-DD"))
        .param(ParamSpec::query("adjust", ParamKind::Boolean, "Adjust amounts for splits")),
        company(
            "GetSplits",
            "splits",
            "Historical stock split events with split ratios.",
            OutputShape::object(&["splits"]),
            Tier::Grow,
        )
        .param(ParamSpec::query("range", ParamKind::String, "Preset range").one_of(&["last", "1m", "3m", "6m", "ytd", "1y", "2y", "5y", "full"]))
        .param(ParamSpec::query("start_date", ParamKind::String, "Start date, YYYY-MM-DD"))
        .param(ParamSpec::query("end_date", ParamKind::String, "End date, YYYY-MM-DD")),
        company(
            "GetEarnings",
            "earnings",
            "Historical and upcoming earnings reports with reported and estimated EPS and surprise.",
            OutputShape::object(&["earnings"]),
            Tier::Basic,
        )
        .param(ParamSpec::query("period", ParamKind::String, "Reporting period").one_of(&["latest", "next"]))
        .param(outputsize("Number of reports to return"))
        .params(date_range().into_iter().filter(|p| p.name != "date"))
        .param(ParamSpec::query("dp", ParamKind::Integer, "Number of decimal places")),
        Operation::new(
            "GetEarningsCalendar",
            "earnings_calendar",
            "Calendar of upcoming and past earnings announcements across all companies.",
        )
        .param(ParamSpec::query("exchange", ParamKind::String, "Filter by exchange"))
        .param(ParamSpec::query("mic_code", ParamKind::String, "Filter by MIC code"))
        .param(ParamSpec::query("country", ParamKind::String, "Filter by country"))
        .param(ParamSpec::query("start_date", ParamKind::String, "Start date, YYYY-MM-DD"))
        .param(ParamSpec::query("end_date", ParamKind::String, "End date, YYYY-MM-DD"))
        .param(ParamSpec::query("dp", ParamKind::Integer, "Number of decimal places"))
        .output(OutputShape::object(&["earnings"]))
        .tier(Tier::Basic),
        Operation::new(
            "GetIpoCalendar",
            "ipo_calendar",
            "Past, today's and upcoming initial public offerings (IPOs).",
        )
        .param(ParamSpec::query("exchange", ParamKind::String, "Filter by exchange"))
        .param(ParamSpec::query("mic_code", ParamKind::String, "Filter by MIC code"))
        .param(ParamSpec::query("country", ParamKind::String, "Filter by country"))
        .param(ParamSpec::query("start_date", ParamKind::String, "Start date, YYYY-MM-DD"))
        .param(ParamSpec::query("end_date", ParamKind::String, "End date, YYYY-MM-DD"))
        .tier(Tier::Grow),
        statement(
            "GetIncomeStatement",
            "income_statement",
            "Income statement: revenue, gross profit, operating income, net income and EPS per period.",
            &["income_statement"],
        ),
        statement(
            "GetBalanceSheet",
            "balance_sheet",
            "Balance sheet: assets, liabilities and shareholders' equity per period.",
            &["balance_sheet"],
        ),
        statement(
            "GetCashFlow",
            "cash_flow",
            "Cash flow statement: operating, investing and financing cash flows per period.",
            &["cash_flow"],
        ),
        company(
            "GetMarketCap",
            "market_cap",
            "Historical market capitalization of a company.",
            OutputShape::object(&["market_cap"]),
            Tier::Pro,
        )
        .param(ParamSpec::query("start_date", ParamKind::String, "Start date, YYYY-MM-DD"))
        .param(ParamSpec::query("end_date", ParamKind::String, "End date, YYYY-MM-DD"))
        .param(ParamSpec::query("page", ParamKind::Integer, "Page number"))
        .param(outputsize("Rows per page")),
        company(
            "GetKeyExecutives",
            "key_executives",
            "Key executives of a company with titles, age and pay.",
            OutputShape::object(&["key_executives"]),
            Tier::Ultra,
        ),
        company(
            "GetInstitutionalHolders",
            "institutional_holders",
            "Largest institutional holders of a company's shares.",
            OutputShape::object(&["institutional_holders"]),
            Tier::Ultra,
        ),
        company(
            "GetInsiderTransactions",
            "insider_transactions",
            "Recent insider buying and selling by company officers and directors.",
            OutputShape::object(&["insider_transactions"]),
            Tier::Pro,
        ),
    ]
}

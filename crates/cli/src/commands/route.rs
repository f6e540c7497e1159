//! One-shot routing from the command line.
//!
//! Runs the full pipeline in-process with the pre-shared keys from the
//! environment and prints the routing result as JSON.
//!
//! ```bash
//! mr-cli route "Show me TSLA 1 minute candles"
//! mr-cli route "Top market movers" --plan basic --format md
//! ```

use market_router::config::RouterConfig;
use market_router::credentials::Credentials;
use market_router::router::RoutingRequest;
use market_router::state::build_router;
use market_router_core::OutputFormat;

use super::CliError;

/// Route `query` and print the result.
///
/// # Errors
///
/// Returns an error if configuration or keys are missing, the router cannot
/// be built, or routing reported an error.
pub async fn run(query: String, plan: Option<String>, format: OutputFormat) -> Result<(), CliError> {
    let config = RouterConfig::from_env()?;
    let (Some(market_data), Some(llm)) = (
        config.market_data.api_key.clone(),
        config.openai.api_key.clone(),
    ) else {
        return Err(CliError::Usage(
            "MARKET_DATA_API_KEY and OPENAI_API_KEY must be set".to_string(),
        ));
    };

    let router = build_router(&config).await?;
    let request = RoutingRequest {
        query,
        plan,
        format,
        credentials: Credentials { market_data, llm },
    };
    let result = router.route(&request).await;

    let json = serde_json::to_string_pretty(&result)?;
    #[allow(clippy::print_stdout)]
    {
        println!("{json}");
    }

    match result.error {
        Some(error) => Err(CliError::Failed(error)),
        None => Ok(()),
    }
}

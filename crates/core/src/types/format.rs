//! Output format requested by the caller.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned for an unrecognised format name.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown output format '{0}' (expected json or md)")]
pub struct UnknownFormat(pub String);

/// How the payload of a routed call is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    /// The upstream JSON, unchanged.
    #[default]
    Structured,
    /// A Markdown report rendered from the upstream JSON by a second LLM pass.
    Summarized,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured => write!(f, "json"),
            Self::Summarized => write!(f, "md"),
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = UnknownFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" | "structured" => Ok(Self::Structured),
            "md" | "markdown" | "summarized" => Ok(Self::Summarized),
            _ => Err(UnknownFormat(s.to_owned())),
        }
    }
}

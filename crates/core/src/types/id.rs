//! Operation identifier type.

use core::fmt;
use std::borrow::Borrow;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing an [`OperationId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OperationIdError {
    /// The input string is empty.
    #[error("operation id cannot be empty")]
    Empty,
    /// The input string is too long.
    #[error("operation id must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `[A-Za-z0-9_]`.
    #[error("operation id contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Stable identifier of a market-data operation (e.g. `GetTimeSeries`).
///
/// The same string is used as the function name presented to the language
/// model, the primary key of the embedding index, and the lookup key of the
/// operation registry, so it is restricted to characters every one of those
/// accepts.
///
/// ```
/// use market_router_core::OperationId;
///
/// assert!(OperationId::parse("GetTimeSeries").is_ok());
/// assert!(OperationId::parse("").is_err());
/// assert!(OperationId::parse("get time series").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(feature = "postgres", sqlx(transparent))]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    /// Maximum length accepted by function-calling APIs.
    pub const MAX_LENGTH: usize = 64;

    /// Parse an `OperationId` from a string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, longer than
    /// [`Self::MAX_LENGTH`], or contains anything but ASCII letters, digits
    /// and underscores.
    pub fn parse(s: &str) -> Result<Self, OperationIdError> {
        if s.is_empty() {
            return Err(OperationIdError::Empty);
        }
        if s.len() > Self::MAX_LENGTH {
            return Err(OperationIdError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if let Some(c) = s.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
            return Err(OperationIdError::InvalidCharacter(c));
        }
        Ok(Self(s.to_owned()))
    }

    /// Build an id from a string known to be valid (catalogue literals).
    ///
    /// Validation still runs in debug builds.
    #[must_use]
    pub fn from_static(s: &'static str) -> Self {
        debug_assert!(Self::parse(s).is_ok(), "invalid operation id: {s}");
        Self(s.to_owned())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for OperationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for OperationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for OperationId {
    type Err = OperationIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq<str> for OperationId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for OperationId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

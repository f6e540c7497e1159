//! Subscription tiers of the market-data provider.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a plan name does not match any [`Tier`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown subscription plan '{0}'")]
pub struct UnknownTier(pub String);

/// Subscription tier, ordered from lowest to highest.
///
/// The derived `Ord` follows declaration order, so `Tier::Basic < Tier::Pro`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Basic,
    Grow,
    Pro,
    Ultra,
    Enterprise,
}

impl Tier {
    /// All tiers, lowest first.
    pub const ALL: [Self; 5] = [
        Self::Basic,
        Self::Grow,
        Self::Pro,
        Self::Ultra,
        Self::Enterprise,
    ];

    /// Numeric rank of the tier (0 for `Basic`).
    #[must_use]
    pub const fn rank(self) -> u8 {
        match self {
            Self::Basic => 0,
            Self::Grow => 1,
            Self::Pro => 2,
            Self::Ultra => 3,
            Self::Enterprise => 4,
        }
    }

    /// Whether a caller on this tier may use something that requires `required`.
    #[must_use]
    pub const fn covers(self, required: Self) -> bool {
        self.rank() >= required.rank()
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic => write!(f, "Basic"),
            Self::Grow => write!(f, "Grow"),
            Self::Pro => write!(f, "Pro"),
            Self::Ultra => write!(f, "Ultra"),
            Self::Enterprise => write!(f, "Enterprise"),
        }
    }
}

impl std::str::FromStr for Tier {
    type Err = UnknownTier;

    /// Plan names are matched case-insensitively, ignoring surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|tier| tier.to_string().eq_ignore_ascii_case(&normalized))
            .ok_or_else(|| UnknownTier(s.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_order() {
        assert!(Tier::Basic < Tier::Grow);
        assert!(Tier::Grow < Tier::Pro);
        assert!(Tier::Pro < Tier::Ultra);
        assert!(Tier::Ultra < Tier::Enterprise);
    }

    #[test]
    fn test_rank_matches_order() {
        for pair in Tier::ALL.windows(2) {
            if let [lower, higher] = pair {
                assert!(lower.rank() < higher.rank());
            }
        }
    }

    #[test]
    fn test_covers() {
        assert!(Tier::Pro.covers(Tier::Basic));
        assert!(Tier::Pro.covers(Tier::Pro));
        assert!(!Tier::Grow.covers(Tier::Pro));
    }

    #[test]
    fn test_from_str_case_insensitive() {
        assert_eq!("basic".parse::<Tier>(), Ok(Tier::Basic));
        assert_eq!("Basic".parse::<Tier>(), Ok(Tier::Basic));
        assert_eq!("ULTRA".parse::<Tier>(), Ok(Tier::Ultra));
        assert_eq!(" enterprise ".parse::<Tier>(), Ok(Tier::Enterprise));
    }

    #[test]
    fn test_from_str_unknown() {
        let err = "not-a-real-plan".parse::<Tier>().expect_err("should fail");
        assert_eq!(err, UnknownTier("not-a-real-plan".to_string()));
        assert_eq!(err.to_string(), "unknown subscription plan 'not-a-real-plan'");
    }

    #[test]
    fn test_display_roundtrip() {
        for tier in Tier::ALL {
            assert_eq!(tier.to_string().parse::<Tier>(), Ok(tier));
        }
    }

    #[test]
    fn test_serde_snake_case() {
        let json = serde_json::to_string(&Tier::Enterprise).expect("serialize");
        assert_eq!(json, "\"enterprise\"");
    }
}

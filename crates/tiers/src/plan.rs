use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Entitlement level gating quotas and feature flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    #[default]
    Free,
    Pro,
}
impl Plan {
    pub const ALL: [Plan; 2] = [Plan::Free, Plan::Pro];

    /// Returns the short name for configuration (for displaying to user)
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
        }
    }
}
impl Display for Plan {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
impl FromStr for Plan {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "free" => Ok(Plan::Free),
            "pro" => Ok(Plan::Pro),
            _ => exn::bail!(ErrorKind::UnknownPlan(s.to_string())),
        }
    }
}

/// A named feature that a tier either grants or withholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Resize,
    Crop,
    Compress,
    Convert,
    Filters,
    SocialPresets,
    Palette,
    Archive,
    Watermark,
    TextOverlay,
    BackgroundRemoval,
    Projects,
    CustomNaming,
}
impl Capability {
    pub const ALL: [Capability; 13] = [
        Capability::Resize,
        Capability::Crop,
        Capability::Compress,
        Capability::Convert,
        Capability::Filters,
        Capability::SocialPresets,
        Capability::Palette,
        Capability::Archive,
        Capability::Watermark,
        Capability::TextOverlay,
        Capability::BackgroundRemoval,
        Capability::Projects,
        Capability::CustomNaming,
    ];

    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Resize => "resize",
            Capability::Crop => "crop",
            Capability::Compress => "compress",
            Capability::Convert => "convert",
            Capability::Filters => "filters",
            Capability::SocialPresets => "social-presets",
            Capability::Palette => "palette",
            Capability::Archive => "archive",
            Capability::Watermark => "watermark",
            Capability::TextOverlay => "text-overlay",
            Capability::BackgroundRemoval => "background-removal",
            Capability::Projects => "projects",
            Capability::CustomNaming => "custom-naming",
        }
    }
}
impl Display for Capability {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
impl FromStr for Capability {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_lowercase().replace('_', "-");
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == needle)
            .ok_or_else(|| ErrorKind::UnknownCapability(s.to_string()).into())
    }
}

/// Subscription state as reported by the billing provider.
///
/// Only `active` and `trialing` keep the subscribed plan; everything else
/// (including a payment that is merely late) drops back to [`Plan::Free`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Canceled,
    Unpaid,
    Incomplete,
}
impl SubscriptionStatus {
    /// Resolve the plan a user is entitled to, given the plan they
    /// subscribed to and the current state of that subscription.
    #[must_use]
    pub fn resolve(&self, subscribed: Plan) -> Plan {
        match self {
            Self::Active | Self::Trialing => subscribed,
            Self::PastDue | Self::Canceled | Self::Unpaid | Self::Incomplete => Plan::Free,
        }
    }
}
impl FromStr for SubscriptionStatus {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" | "past-due" => Self::PastDue,
            // Billing providers disagree on the spelling.
            "canceled" | "cancelled" => Self::Canceled,
            "unpaid" => Self::Unpaid,
            "incomplete" | "incomplete_expired" => Self::Incomplete,
            _ => exn::bail!(ErrorKind::UnknownStatus(s.to_string())),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("free", Plan::Free)]
    #[case("FREE", Plan::Free)]
    #[case(" pro ", Plan::Pro)]
    fn test_plan_from_str(#[case] input: &str, #[case] expected: Plan) {
        assert_eq!(input.parse::<Plan>().unwrap(), expected);
    }

    #[test]
    fn test_plan_from_str_invalid() {
        let err = "enterprise".parse::<Plan>().unwrap_err();
        assert_eq!(*err, ErrorKind::UnknownPlan("enterprise".to_string()));
    }

    #[rstest]
    #[case("text-overlay", Capability::TextOverlay)]
    #[case("text_overlay", Capability::TextOverlay)]
    #[case("Background-Removal", Capability::BackgroundRemoval)]
    fn test_capability_from_str(#[case] input: &str, #[case] expected: Capability) {
        assert_eq!(input.parse::<Capability>().unwrap(), expected);
    }

    #[test]
    fn test_capability_names_roundtrip_through_display() {
        for capability in Capability::ALL {
            assert_eq!(capability.to_string().parse::<Capability>().unwrap(), capability);
        }
    }

    #[rstest]
    #[case(SubscriptionStatus::Active, Plan::Pro)]
    #[case(SubscriptionStatus::Trialing, Plan::Pro)]
    #[case(SubscriptionStatus::PastDue, Plan::Free)]
    #[case(SubscriptionStatus::Canceled, Plan::Free)]
    #[case(SubscriptionStatus::Unpaid, Plan::Free)]
    #[case(SubscriptionStatus::Incomplete, Plan::Free)]
    fn test_status_resolves_plan(#[case] status: SubscriptionStatus, #[case] expected: Plan) {
        assert_eq!(status.resolve(Plan::Pro), expected);
    }

    #[test]
    fn test_status_spellings() {
        assert_eq!("cancelled".parse::<SubscriptionStatus>().unwrap(), SubscriptionStatus::Canceled);
        assert_eq!("past_due".parse::<SubscriptionStatus>().unwrap(), SubscriptionStatus::PastDue);
        assert!("paused".parse::<SubscriptionStatus>().is_err());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Plan::Pro).unwrap(), "\"pro\"");
        assert_eq!(serde_json::to_string(&Capability::SocialPresets).unwrap(), "\"social-presets\"");
    }
}

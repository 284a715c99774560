use crate::mime;
use crate::plan::{Capability, Plan};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One mebibyte, the unit file size limits are expressed in to users.
pub const MEGABYTE: u64 = 1024 * 1024;

/// Quotas and feature flags granted by a single [`Plan`].
///
/// Instances are built once by the [`Registry`] and only ever handed out by
/// reference; nothing mutates them after start-up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TierLimits {
    pub plan: Plan,
    /// Maximum number of files accepted into a single batch.
    pub max_images: usize,
    /// Maximum size of a single upload, in bytes.
    pub max_file_size_bytes: u64,
    /// Maximum number of colours returned by palette extraction.
    pub max_palette_colors: usize,
    /// Maximum number of saved projects/templates.
    pub max_templates: usize,
    pub features: BTreeSet<Capability>,
    pub allowed_mime: BTreeSet<&'static str>,
}
impl TierLimits {
    /// Built-in limits for the free tier.
    pub fn free() -> Self {
        Self {
            plan: Plan::Free,
            max_images: 5,
            max_file_size_bytes: 10 * MEGABYTE,
            max_palette_colors: 5,
            max_templates: 0,
            features: BTreeSet::from([
                Capability::Resize,
                Capability::Crop,
                Capability::Compress,
                Capability::Convert,
                Capability::Filters,
                Capability::SocialPresets,
                Capability::Palette,
                Capability::Archive,
            ]),
            allowed_mime: mime::BASIC.into_iter().collect(),
        }
    }

    /// Built-in limits for the pro tier.
    pub fn pro() -> Self {
        Self {
            plan: Plan::Pro,
            max_images: 100,
            max_file_size_bytes: 50 * MEGABYTE,
            max_palette_colors: 20,
            max_templates: 50,
            features: Capability::ALL.into_iter().collect(),
            allowed_mime: mime::BASIC.into_iter().chain(mime::EXTENDED).collect(),
        }
    }

    #[must_use]
    pub fn allows(&self, capability: Capability) -> bool {
        self.features.contains(&capability)
    }

    /// Whether the (normalized) MIME type may be uploaded on this tier.
    #[must_use]
    pub fn accepts_mime(&self, mime: &str) -> bool {
        self.allowed_mime.contains(mime::normalize(mime).as_str())
    }

    /// The file size limit in whole megabytes, as shown to users.
    #[must_use]
    pub fn max_file_size_mb(&self) -> u64 {
        self.max_file_size_bytes / MEGABYTE
    }

    fn apply(mut self, overrides: &LimitOverrides) -> Self {
        if let Some(max_images) = overrides.max_images {
            self.max_images = max_images;
        }
        if let Some(max_file_size_mb) = overrides.max_file_size_mb {
            self.max_file_size_bytes = max_file_size_mb.saturating_mul(MEGABYTE);
        }
        if let Some(max_palette_colors) = overrides.max_palette_colors {
            self.max_palette_colors = max_palette_colors;
        }
        if let Some(max_templates) = overrides.max_templates {
            self.max_templates = max_templates;
        }
        self
    }
}

/// Numeric limits that configuration may override for a tier.
///
/// Feature flags and MIME sets are part of the product definition and are
/// deliberately not overridable.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitOverrides {
    pub max_images: Option<usize>,
    pub max_file_size_mb: Option<u64>,
    pub max_palette_colors: Option<usize>,
    pub max_templates: Option<usize>,
}

/// Static table mapping each [`Plan`] to its [`TierLimits`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Registry {
    free: TierLimits,
    pro: TierLimits,
}
impl Default for Registry {
    fn default() -> Self {
        Self { free: TierLimits::free(), pro: TierLimits::pro() }
    }
}
impl Registry {
    /// Build the registry from the built-in tables with start-up overrides
    /// applied.
    pub fn with_overrides(free: &LimitOverrides, pro: &LimitOverrides) -> Self {
        let registry = Self {
            free: TierLimits::free().apply(free),
            pro: TierLimits::pro().apply(pro),
        };
        tracing::debug!(
            free_images = registry.free.max_images,
            free_size = registry.free.max_file_size_bytes,
            pro_images = registry.pro.max_images,
            pro_size = registry.pro.max_file_size_bytes,
            "Tier registry initialized"
        );
        registry
    }

    #[must_use]
    pub fn limits(&self, plan: Plan) -> &TierLimits {
        match plan {
            Plan::Free => &self.free,
            Plan::Pro => &self.pro,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_free_tier_defaults() {
        let free = TierLimits::free();
        assert_eq!(free.max_images, 5);
        assert_eq!(free.max_file_size_bytes, 10 * MEGABYTE);
        assert_eq!(free.max_file_size_mb(), 10);
        assert!(!free.allows(Capability::Watermark));
        assert!(free.allows(Capability::Resize));
    }

    #[test]
    fn test_pro_is_superset_of_free() {
        let (free, pro) = (TierLimits::free(), TierLimits::pro());
        assert!(free.features.is_subset(&pro.features));
        assert!(free.allowed_mime.is_subset(&pro.allowed_mime));
        assert!(pro.max_images > free.max_images);
        assert!(pro.max_file_size_bytes > free.max_file_size_bytes);
    }

    #[rstest]
    #[case(Plan::Free, "image/png", true)]
    #[case(Plan::Free, "image/jpg", true)]
    #[case(Plan::Free, "image/tiff", false)]
    #[case(Plan::Free, "application/pdf", false)]
    #[case(Plan::Pro, "image/tiff", true)]
    #[case(Plan::Pro, "image/svg+xml", true)]
    #[case(Plan::Pro, "application/pdf", true)]
    #[case(Plan::Pro, "text/plain", false)]
    fn test_accepts_mime(#[case] plan: Plan, #[case] mime: &str, #[case] expected: bool) {
        let registry = Registry::default();
        assert_eq!(registry.limits(plan).accepts_mime(mime), expected);
    }

    #[test]
    fn test_overrides_only_touch_numbers() {
        let overrides = LimitOverrides { max_images: Some(2), max_file_size_mb: Some(1), ..Default::default() };
        let registry = Registry::with_overrides(&overrides, &LimitOverrides::default());
        let free = registry.limits(Plan::Free);
        assert_eq!(free.max_images, 2);
        assert_eq!(free.max_file_size_bytes, MEGABYTE);
        assert_eq!(free.features, TierLimits::free().features);
        assert_eq!(registry.limits(Plan::Pro), &TierLimits::pro());
    }
}

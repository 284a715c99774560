//! Plans, limits and upload gating.
//!
//! - **[`Registry`]** maps each [`Plan`] to immutable [`TierLimits`] (image
//!   count, file size, palette size, saved templates, feature flags, MIME
//!   types).
//! - **[`Entitlement`]** holds the plan of whoever owns the session. It is
//!   passed explicitly to every check instead of living in global state.
//! - **[`validate`]**/**[`validate_batch`]** gate uploads before any
//!   processing starts; **[`require`]** gates features.
//!
//! ```
//! use resizesuite_tiers::{Entitlement, Plan, Registry};
//!
//! let registry = Registry::default();
//! let mut entitlement = Entitlement::default();
//! assert_eq!(entitlement.limits(&registry).max_images, 5);
//! entitlement.set_plan(Plan::Pro);
//! assert_eq!(entitlement.limits(&registry).max_images, 100);
//! ```

mod entitlement;
pub mod error;
mod limits;
pub mod mime;
mod plan;
mod validate;

pub use crate::entitlement::Entitlement;
pub use crate::limits::{LimitOverrides, MEGABYTE, Registry, TierLimits};
pub use crate::plan::{Capability, Plan, SubscriptionStatus};
pub use crate::validate::{BatchValidation, Candidate, ContentPolicy, Rejection, require, validate, validate_batch};

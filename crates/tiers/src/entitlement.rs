use crate::error::Result;
use crate::limits::{Registry, TierLimits};
use crate::plan::{Plan, SubscriptionStatus};

/// The plan the current user is entitled to.
///
/// An `Entitlement` belongs to whoever owns the session (a CLI invocation, a
/// request context) and is passed explicitly into every gating check. There
/// is no ambient global: two sessions in one process never see each other's
/// plan. Defaults to [`Plan::Free`] until something says otherwise.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Entitlement {
    plan: Plan,
}
impl Entitlement {
    pub fn new(plan: Plan) -> Self {
        Self { plan }
    }

    pub fn plan(&self) -> Plan {
        self.plan
    }

    pub fn set_plan(&mut self, plan: Plan) {
        if plan != self.plan {
            tracing::info!(from = %self.plan, to = %plan, "Entitlement changed");
        }
        self.plan = plan;
    }

    /// Update the plan from the `plan_name` + `subscription_status` pair a
    /// profile lookup returns.
    pub fn apply_subscription(&mut self, plan_name: &str, status: &str) -> Result<Plan> {
        let subscribed: Plan = plan_name.parse()?;
        let status: SubscriptionStatus = status.parse()?;
        let plan = status.resolve(subscribed);
        self.set_plan(plan);
        Ok(plan)
    }

    /// The limits of the current plan.
    pub fn limits<'r>(&self, registry: &'r Registry) -> &'r TierLimits {
        registry.limits(self.plan)
    }
}

//! Workflow configuration.

use civicdesk_core::models::complaint::TransitionPolicy;

/// Configuration for the complaint lifecycle engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct LifecycleConfig {
    /// Which status changes `update_status` accepts (default: permissive).
    pub transition_policy: TransitionPolicy,
}

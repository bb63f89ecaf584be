//! Screen access-control gate.
//!
//! Every screen in the app declares a [`ScreenPolicy`] describing which
//! checks apply to it. Before the screen becomes interactive the host
//! evaluates that policy against a [`DeviceState`] snapshot and acts on
//! the resulting [`AccessDecision`]: open the screen, launch an admin
//! password challenge, redirect to the lockdown surface, or restart the
//! configuration flow.

use std::sync::Arc;

use tracing::debug;

use crate::services::AlertSignal;

/// Capability flags declared once per screen type.
///
/// Screens declare their policy as data; the checks themselves live in
/// [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenPolicy {
    /// Block this screen while the app is in emergency (forgot-password)
    /// mode.
    pub apply_emergency_block: bool,
    /// Require an administrator password before use on managed devices.
    pub is_protected: bool,
    /// Refuse to open once maintenance of the app is discontinued.
    pub apply_end_of_support: bool,
    /// Refuse to open until the software license is accepted. Root
    /// detection belongs to the same family: unrooted devices only.
    pub apply_license_protection: bool,
    /// Ask the window system to prevent screenshots and overlays. Does
    /// not influence the decision; the host reads it after `Allow`.
    pub is_secured: bool,
    /// Close and reconfigure if a local reset was requested externally.
    pub apply_local_reset_check: bool,
}

impl Default for ScreenPolicy {
    fn default() -> Self {
        Self {
            apply_emergency_block: true,
            is_protected: false,
            apply_end_of_support: true,
            apply_license_protection: true,
            is_secured: false,
            apply_local_reset_check: true,
        }
    }
}

impl ScreenPolicy {
    /// Reset-style screens: admin protected and secured, and exempt from
    /// the local-reset redirect so a running reset is not interrupted.
    pub fn reset_screen() -> Self {
        Self {
            is_protected: true,
            is_secured: true,
            apply_local_reset_check: false,
            ..Self::default()
        }
    }

    /// The emergency security-code entry surface itself. Must stay
    /// reachable while everything else is locked down.
    pub fn emergency_entry() -> Self {
        Self {
            apply_emergency_block: false,
            is_secured: true,
            ..Self::default()
        }
    }

    /// License display/acceptance screens, reachable before the license
    /// has been accepted.
    pub fn license_screen() -> Self {
        Self {
            apply_license_protection: false,
            ..Self::default()
        }
    }
}

/// Externally-supplied device and app state at evaluation time.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceState {
    pub rooted: bool,
    pub emergency_mode: bool,
    pub admin_unlocked: bool,
    pub organization_managed: bool,
    pub app_configured: bool,
    pub license_accepted: bool,
    pub reconfig_requested: bool,
}

/// Outcome of evaluating a screen-open request. Exactly one variant is
/// produced per evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Open the screen immediately.
    Allow,
    /// Launch the admin password challenge before opening.
    RequireAdminAuth,
    /// Refuse: device is rooted.
    BlockRooted,
    /// Refuse and redirect to the security-code surface.
    BlockEmergencyMode,
    /// Refuse: the software license has not been accepted.
    BlockLicenseNotAccepted,
    /// Close and restart the local configuration flow.
    ForceReconfig,
}

/// Decide whether a screen may open. Checks run in fixed order and the
/// first match wins: the license family (root, license acceptance)
/// dominates the emergency block, which dominates the admin gate, which
/// dominates the reconfiguration redirect.
pub fn evaluate(policy: &ScreenPolicy, state: &DeviceState) -> AccessDecision {
    if policy.apply_license_protection && state.rooted {
        return AccessDecision::BlockRooted;
    }

    if policy.apply_license_protection && !state.license_accepted {
        return AccessDecision::BlockLicenseNotAccepted;
    }

    if policy.apply_emergency_block && state.emergency_mode {
        return AccessDecision::BlockEmergencyMode;
    }

    if policy.is_protected
        && !state.admin_unlocked
        && state.organization_managed
        && state.app_configured
    {
        return AccessDecision::RequireAdminAuth;
    }

    if policy.apply_local_reset_check && state.reconfig_requested {
        return AccessDecision::ForceReconfig;
    }

    AccessDecision::Allow
}

/// [`evaluate`] plus its one sanctioned side effect: an emergency-mode
/// block arms the device alert signal (fire and forget).
pub struct ScreenGate {
    alert: Arc<dyn AlertSignal>,
}

impl ScreenGate {
    pub fn new(alert: Arc<dyn AlertSignal>) -> Self {
        Self { alert }
    }

    pub fn admit(&self, policy: &ScreenPolicy, state: &DeviceState) -> AccessDecision {
        let decision = evaluate(policy, state);
        debug!("screen gate decision: {:?}", decision);

        if decision == AccessDecision::BlockEmergencyMode {
            self.alert.arm();
        }

        decision
    }
}

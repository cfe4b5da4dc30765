//! Per-role channel access control.
//!
//! Each role has a fixed allow-list sourced from configuration. Requested
//! channels outside the list are rejected per-subscription — the client is
//! told which were accepted and which were not, and nothing else happens.

use crate::config::ChannelsConfig;
use crate::constants::Role;

/// Role → channel allow-list, resolved from configuration
#[derive(Debug, Clone)]
pub struct ChannelAcl {
    config: ChannelsConfig,
}

impl ChannelAcl {
    pub fn new(config: ChannelsConfig) -> Self {
        Self { config }
    }

    pub fn is_allowed(&self, role: Role, channel: &str) -> bool {
        self.config
            .allowed_for(role)
            .iter()
            .any(|allowed| allowed == channel)
    }

    /// Split a subscription request into accepted and rejected channels
    pub fn partition(&self, role: Role, requested: &[String]) -> (Vec<String>, Vec<String>) {
        requested
            .iter()
            .cloned()
            .partition(|channel| self.is_allowed(role, channel))
    }

    pub fn allowed_for(&self, role: Role) -> &[String] {
        self.config.allowed_for(role)
    }
}

impl Default for ChannelAcl {
    fn default() -> Self {
        Self::new(ChannelsConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_cannot_reach_admin() {
        let acl = ChannelAcl::default();
        assert!(acl.is_allowed(Role::Operator, "production"));
        assert!(!acl.is_allowed(Role::Operator, "admin"));
        assert!(!acl.is_allowed(Role::Operator, "alerts"));
    }

    #[test]
    fn test_partition_reports_rejections() {
        let acl = ChannelAcl::default();
        let requested = vec![
            "machines".to_string(),
            "admin".to_string(),
            "alerts".to_string(),
        ];

        let (accepted, rejected) = acl.partition(Role::Operator, &requested);
        assert_eq!(accepted, vec!["machines".to_string()]);
        assert_eq!(rejected, vec!["admin".to_string(), "alerts".to_string()]);

        let (accepted, rejected) = acl.partition(Role::Admin, &requested);
        assert_eq!(accepted.len(), 3);
        assert!(rejected.is_empty());
    }

    #[test]
    fn test_supervisor_gains_alerts_and_analytics() {
        let acl = ChannelAcl::default();
        assert!(acl.is_allowed(Role::Supervisor, "alerts"));
        assert!(acl.is_allowed(Role::Supervisor, "analytics"));
        assert!(!acl.is_allowed(Role::Supervisor, "admin"));
    }

    #[test]
    fn test_unknown_channel_rejected_for_everyone() {
        let acl = ChannelAcl::default();
        assert!(!acl.is_allowed(Role::Admin, "smoke-signals"));
    }
}

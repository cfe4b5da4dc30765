//! Configurable transition tables for orders and machines.
//!
//! The transition graph is configuration, not code: both tables are loaded
//! from the config file with a compiled-in default, and every state change is
//! validated against them. The order table default encodes the lifecycle
//! graph; the machine table default encodes the administrative status graph.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::states::{MachineState, OrderState};

/// Versioned container for both transition tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionsConfig {
    /// Bumped whenever the shape of the tables changes
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub orders: OrderTransitionTable,
    #[serde(default)]
    pub machines: MachineTransitionTable,
}

fn default_version() -> u32 {
    1
}

impl Default for TransitionsConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            orders: OrderTransitionTable::default(),
            machines: MachineTransitionTable::default(),
        }
    }
}

/// Allowed order lifecycle transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderTransitionTable {
    pub allowed: HashMap<OrderState, Vec<OrderState>>,
}

impl OrderTransitionTable {
    /// Check whether `from → to` is permitted
    pub fn allows(&self, from: OrderState, to: OrderState) -> bool {
        self.allowed
            .get(&from)
            .is_some_and(|targets| targets.contains(&to))
    }

    /// States with no outgoing edges
    pub fn terminal_states(&self) -> Vec<OrderState> {
        [
            OrderState::Pending,
            OrderState::InProgress,
            OrderState::Paused,
            OrderState::Stopped,
            OrderState::Completed,
            OrderState::Cancelled,
        ]
        .into_iter()
        .filter(|s| self.allowed.get(s).map_or(true, Vec::is_empty))
        .collect()
    }
}

impl Default for OrderTransitionTable {
    fn default() -> Self {
        let mut allowed = HashMap::new();
        allowed.insert(
            OrderState::Pending,
            vec![OrderState::InProgress, OrderState::Cancelled],
        );
        allowed.insert(
            OrderState::InProgress,
            vec![
                OrderState::Paused,
                OrderState::Stopped,
                OrderState::Completed,
                OrderState::Cancelled,
            ],
        );
        allowed.insert(
            OrderState::Paused,
            vec![
                OrderState::InProgress,
                OrderState::Completed,
                OrderState::Cancelled,
            ],
        );
        allowed.insert(
            OrderState::Stopped,
            vec![
                OrderState::InProgress,
                OrderState::Completed,
                OrderState::Cancelled,
            ],
        );
        allowed.insert(OrderState::Completed, vec![]);
        allowed.insert(OrderState::Cancelled, vec![]);
        Self { allowed }
    }
}

/// Allowed machine status transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineTransitionTable {
    pub allowed: HashMap<MachineState, Vec<MachineState>>,
}

impl MachineTransitionTable {
    pub fn allows(&self, from: MachineState, to: MachineState) -> bool {
        self.allowed
            .get(&from)
            .is_some_and(|targets| targets.contains(&to))
    }
}

impl Default for MachineTransitionTable {
    fn default() -> Self {
        let mut allowed = HashMap::new();
        allowed.insert(
            MachineState::Available,
            vec![
                MachineState::InUse,
                MachineState::Maintenance,
                MachineState::Offline,
            ],
        );
        allowed.insert(
            MachineState::InUse,
            vec![
                MachineState::Available,
                MachineState::Paused,
                MachineState::Offline,
            ],
        );
        allowed.insert(
            MachineState::Paused,
            vec![
                MachineState::InUse,
                MachineState::Available,
                MachineState::Offline,
            ],
        );
        allowed.insert(
            MachineState::Maintenance,
            vec![MachineState::Available, MachineState::Offline],
        );
        allowed.insert(
            MachineState::Offline,
            vec![MachineState::Available, MachineState::Maintenance],
        );
        Self { allowed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_order_graph() {
        let table = OrderTransitionTable::default();

        assert!(table.allows(OrderState::Pending, OrderState::InProgress));
        assert!(table.allows(OrderState::InProgress, OrderState::Paused));
        assert!(table.allows(OrderState::Paused, OrderState::InProgress));
        assert!(table.allows(OrderState::Stopped, OrderState::InProgress));
        assert!(table.allows(OrderState::Stopped, OrderState::Completed));

        // Pending cannot skip straight to terminal production states
        assert!(!table.allows(OrderState::Pending, OrderState::Completed));
        assert!(!table.allows(OrderState::Pending, OrderState::Paused));
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        let table = OrderTransitionTable::default();
        let terminals = table.terminal_states();

        assert!(terminals.contains(&OrderState::Completed));
        assert!(terminals.contains(&OrderState::Cancelled));
        assert_eq!(terminals.len(), 2);

        assert!(!table.allows(OrderState::Completed, OrderState::InProgress));
        assert!(!table.allows(OrderState::Cancelled, OrderState::Pending));
    }

    #[test]
    fn test_default_machine_graph() {
        let table = MachineTransitionTable::default();

        assert!(table.allows(MachineState::Available, MachineState::InUse));
        assert!(table.allows(MachineState::InUse, MachineState::Available));
        assert!(table.allows(MachineState::Offline, MachineState::Maintenance));

        // A machine in use cannot jump directly into maintenance
        assert!(!table.allows(MachineState::InUse, MachineState::Maintenance));
    }

    #[test]
    fn test_tables_survive_yaml_round_trip() {
        let config = TransitionsConfig::default();
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: TransitionsConfig = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(parsed.version, 1);
        assert!(parsed.orders.allows(OrderState::Pending, OrderState::InProgress));
        assert!(parsed.machines.allows(MachineState::Available, MachineState::InUse));
    }
}

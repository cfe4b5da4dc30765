//! Transition graph tests: the allowed lifecycle paths, terminality, and the
//! event → target-state mapping, including a property check that no path
//! ever leaves a terminal state.

use mes_core::state_machine::{
    MachineState, MachineTransitionTable, OrderEvent, OrderState, OrderTransitionTable,
};
use proptest::prelude::*;

const ALL_ORDER_STATES: [OrderState; 6] = [
    OrderState::Pending,
    OrderState::InProgress,
    OrderState::Paused,
    OrderState::Stopped,
    OrderState::Completed,
    OrderState::Cancelled,
];

#[test]
fn full_lifecycle_path_is_allowed() {
    let table = OrderTransitionTable::default();

    // Pending -> InProgress -> Paused -> InProgress -> Stopped -> Completed
    let path = [
        (OrderState::Pending, OrderState::InProgress),
        (OrderState::InProgress, OrderState::Paused),
        (OrderState::Paused, OrderState::InProgress),
        (OrderState::InProgress, OrderState::Stopped),
        (OrderState::Stopped, OrderState::Completed),
    ];
    for (from, to) in path {
        assert!(table.allows(from, to), "{from} -> {to} should be allowed");
    }
}

#[test]
fn completed_and_cancelled_are_terminal() {
    let table = OrderTransitionTable::default();

    for target in ALL_ORDER_STATES {
        assert!(!table.allows(OrderState::Completed, target));
        assert!(!table.allows(OrderState::Cancelled, target));
    }
    assert!(OrderState::Completed.is_terminal());
    assert!(OrderState::Cancelled.is_terminal());
}

#[test]
fn pending_cannot_skip_to_production_states() {
    let table = OrderTransitionTable::default();

    assert!(!table.allows(OrderState::Pending, OrderState::Paused));
    assert!(!table.allows(OrderState::Pending, OrderState::Stopped));
    assert!(!table.allows(OrderState::Pending, OrderState::Completed));
}

#[test]
fn events_map_to_expected_targets() {
    assert_eq!(
        OrderEvent::Start {
            machine_id: 1,
            operator_id: 1
        }
        .target_state(),
        OrderState::InProgress
    );
    assert_eq!(
        OrderEvent::Pause {
            reason: "changeover".into(),
            notes: None
        }
        .target_state(),
        OrderState::Paused
    );
    assert_eq!(OrderEvent::Resume.target_state(), OrderState::InProgress);
    assert_eq!(
        OrderEvent::Complete {
            actual_quantity: Some(10),
            waste_quantity: None,
            quality_notes: None,
            allow_overrun: false
        }
        .target_state(),
        OrderState::Completed
    );
}

#[test]
fn machine_table_keeps_in_use_out_of_maintenance() {
    let table = MachineTransitionTable::default();

    assert!(table.allows(MachineState::Available, MachineState::InUse));
    assert!(table.allows(MachineState::InUse, MachineState::Available));
    assert!(!table.allows(MachineState::InUse, MachineState::InUse));
    assert!(!table.allows(MachineState::InUse, MachineState::Maintenance));
    assert!(!table.allows(MachineState::Maintenance, MachineState::InUse));
}

proptest! {
    /// No sequence of allowed transitions escapes a terminal state.
    #[test]
    fn terminal_states_admit_no_transition(from in 0usize..6, to in 0usize..6) {
        let table = OrderTransitionTable::default();
        let from = ALL_ORDER_STATES[from];
        let to = ALL_ORDER_STATES[to];

        if from.is_terminal() {
            prop_assert!(!table.allows(from, to));
        }
    }

    /// Every allowed transition leaves machine-holding semantics coherent:
    /// a machine-holding state can only be entered from pending (via start)
    /// or another machine-holding state.
    #[test]
    fn machine_holding_states_entered_from_holding_or_pending(from in 0usize..6, to in 0usize..6) {
        let table = OrderTransitionTable::default();
        let from = ALL_ORDER_STATES[from];
        let to = ALL_ORDER_STATES[to];

        if table.allows(from, to) && to.holds_machine() {
            prop_assert!(from.holds_machine() || from == OrderState::Pending);
        }
    }
}

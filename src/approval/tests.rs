// Property tests for the approval engine and projection

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::super::engine::apply;
    use super::super::projection::project;
    use super::super::types::*;
    use crate::workflows::WorkflowError;

    fn consistent_gates() -> impl Strategy<Value = Gates> {
        use GateState::{Approved, Pending, Rejected};
        prop_oneof![
            Just(Gates::new([Pending, Pending, Pending])),
            Just(Gates::new([Approved, Pending, Pending])),
            Just(Gates::new([Rejected, Pending, Pending])),
            Just(Gates::new([Approved, Approved, Pending])),
            Just(Gates::new([Approved, Rejected, Pending])),
            Just(Gates::new([Approved, Approved, Approved])),
            Just(Gates::new([Approved, Approved, Rejected])),
        ]
    }

    proptest! {
        #[test]
        fn prop_approved_only_when_every_gate_approved(states in any::<[GateState; 3]>()) {
            let gates = Gates::new(states);
            if project(&gates) == DisplayStatus::Approved {
                prop_assert_eq!(states, [GateState::Approved; 3]);
            }
        }

        #[test]
        fn prop_any_rejection_projects_rejected(states in any::<[GateState; 3]>()) {
            let gates = Gates::new(states);
            if states.contains(&GateState::Rejected) {
                prop_assert_eq!(project(&gates), DisplayStatus::Rejected);
            } else {
                prop_assert_ne!(project(&gates), DisplayStatus::Rejected);
            }
        }

        #[test]
        fn prop_wrong_role_always_unauthorized(
            states in any::<[GateState; 3]>(),
            action in any::<ExpenseAction>(),
            role in any::<Role>(),
        ) {
            prop_assume!(role != action.gate().required_role());
            let result = apply(&Gates::new(states), action, role);
            let is_unauthorized = matches!(result, Err(WorkflowError::Unauthorized { .. }));
            prop_assert!(is_unauthorized);
        }

        #[test]
        fn prop_apply_is_deterministic(
            states in any::<[GateState; 3]>(),
            action in any::<ExpenseAction>(),
            role in any::<Role>(),
        ) {
            let gates = Gates::new(states);
            prop_assert_eq!(apply(&gates, action, role), apply(&gates, action, role));
        }

        #[test]
        fn prop_apply_preserves_consistency(
            gates in consistent_gates(),
            action in any::<ExpenseAction>(),
        ) {
            let role = action.gate().required_role();
            if let Ok(next) = apply(&gates, action, role) {
                prop_assert!(next.gates.is_consistent());
                prop_assert!(next.edit_locked);
                // exactly one gate changed
                let changed = ApprovalGate::ALL
                    .iter()
                    .filter(|gate| gates.get(**gate) != next.gates.get(**gate))
                    .count();
                prop_assert_eq!(changed, 1);
            }
        }

        #[test]
        fn prop_nothing_above_a_rejection_can_be_decided(
            action in any::<ExpenseAction>(),
        ) {
            let gates = Gates::new([GateState::Approved, GateState::Rejected, GateState::Pending]);
            prop_assume!(action.gate() == ApprovalGate::Accounting);
            let result = apply(&gates, action, Role::Accounting);
            let is_out_of_order = matches!(result, Err(WorkflowError::OutOfOrder { .. }));
            prop_assert!(is_out_of_order);
        }
    }

    #[test]
    fn test_full_approval_run() {
        let mut workflow = ExpenseWorkflow::default();
        assert!(!workflow.edit_locked);

        for gate in ApprovalGate::ALL {
            assert_ne!(project(&workflow.gates), DisplayStatus::Approved);
            workflow = apply(
                &workflow.gates,
                ExpenseAction::Approve(gate),
                gate.required_role(),
            )
            .unwrap();
            assert!(workflow.edit_locked);
        }

        assert_eq!(project(&workflow.gates), DisplayStatus::Approved);
        assert!(workflow.gates.is_consistent());
    }

    #[test]
    fn test_rejection_then_projection() {
        let gates = Gates::new([GateState::Approved, GateState::Approved, GateState::Pending]);
        let workflow = apply(
            &gates,
            ExpenseAction::Reject(ApprovalGate::Accounting),
            Role::Accounting,
        )
        .unwrap();

        assert_eq!(
            workflow.gates,
            Gates::new([GateState::Approved, GateState::Approved, GateState::Rejected])
        );
        assert_eq!(project(&workflow.gates), DisplayStatus::Rejected);
    }

    #[test]
    fn test_action_parsing() {
        assert_eq!(
            "approve:supervisor".parse::<ExpenseAction>().unwrap(),
            ExpenseAction::Approve(ApprovalGate::Supervisor)
        );
        assert_eq!(
            ExpenseAction::from_parts("Reject", "Accounting").unwrap(),
            ExpenseAction::Reject(ApprovalGate::Accounting)
        );
        assert_eq!(
            "approve:treasurer".parse::<ExpenseAction>().unwrap_err(),
            WorkflowError::UnknownGate("treasurer".to_string())
        );
        assert_eq!(
            "escalate:supervisor".parse::<ExpenseAction>().unwrap_err(),
            WorkflowError::UnknownAction("escalate".to_string())
        );
    }

    #[test]
    fn test_gate_consistency_check() {
        use GateState::{Approved, Pending, Rejected};

        assert!(Gates::new([Approved, Rejected, Pending]).is_consistent());
        assert!(!Gates::new([Pending, Approved, Pending]).is_consistent());
        assert!(!Gates::new([Rejected, Pending, Rejected]).is_consistent());
    }

    #[test]
    fn test_gates_serialize_as_array() {
        let gates = Gates::new([GateState::Approved, GateState::Rejected, GateState::Pending]);
        let json = serde_json::to_string(&gates).unwrap();
        assert_eq!(json, r#"["approved","rejected","pending"]"#);
    }
}

// Status projection shared by every expense view

use super::types::{ApprovalGate, DisplayStatus, Gates, StatusKind};

/// Map gate values to the status shown in list, dashboard and report views.
///
/// Precedence is fixed: any rejection wins, then full approval, then the
/// furthest gate currently under review.
pub fn project(gates: &Gates) -> DisplayStatus {
    if gates.iter().any(|(_, state)| state.is_rejected()) {
        return DisplayStatus::Rejected;
    }

    if gates.iter().all(|(_, state)| state.is_approved()) {
        return DisplayStatus::Approved;
    }

    if gates.get(ApprovalGate::Accounting).is_pending()
        && gates.get(ApprovalGate::Supervisor).is_approved()
    {
        return DisplayStatus::InReview(ApprovalGate::Accounting);
    }

    if gates.get(ApprovalGate::Supervisor).is_pending()
        && gates.get(ApprovalGate::Assistant).is_approved()
    {
        return DisplayStatus::InReview(ApprovalGate::Supervisor);
    }

    DisplayStatus::Pending
}

/// Keep only the items whose projected status matches `filter`.
/// `None` keeps everything.
pub fn filter_by_status<'a, T, I, F>(
    items: I,
    filter: Option<StatusKind>,
    gates_of: F,
) -> Vec<&'a T>
where
    I: IntoIterator<Item = &'a T>,
    F: Fn(&T) -> &Gates,
    T: 'a,
{
    items
        .into_iter()
        .filter(|item| filter.map_or(true, |kind| project(gates_of(*item)).kind() == kind))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::types::GateState::{Approved, Pending, Rejected};

    #[test]
    fn test_projection_table() {
        let cases = [
            ([Pending, Pending, Pending], DisplayStatus::Pending),
            ([Approved, Pending, Pending], DisplayStatus::InReview(ApprovalGate::Supervisor)),
            ([Approved, Approved, Pending], DisplayStatus::InReview(ApprovalGate::Accounting)),
            ([Approved, Approved, Approved], DisplayStatus::Approved),
            ([Rejected, Pending, Pending], DisplayStatus::Rejected),
            ([Approved, Rejected, Pending], DisplayStatus::Rejected),
            ([Approved, Approved, Rejected], DisplayStatus::Rejected),
        ];

        for (gates, expected) in cases {
            assert_eq!(project(&Gates::new(gates)), expected, "gates {gates:?}");
        }
    }

    #[test]
    fn test_rejection_dominates_inconsistent_records() {
        // legacy rows with a decision above a rejection still read as rejected
        assert_eq!(project(&Gates::new([Rejected, Approved, Approved])), DisplayStatus::Rejected);
        assert_eq!(project(&Gates::new([Pending, Pending, Rejected])), DisplayStatus::Rejected);
    }

    #[test]
    fn test_filter_by_status() {
        let rows = vec![
            ("a", Gates::new([Pending, Pending, Pending])),
            ("b", Gates::new([Approved, Approved, Approved])),
            ("c", Gates::new([Approved, Rejected, Pending])),
            ("d", Gates::new([Approved, Pending, Pending])),
        ];

        let rejected = filter_by_status(&rows, Some(StatusKind::Rejected), |row| &row.1);
        assert_eq!(rejected.iter().map(|row| row.0).collect::<Vec<_>>(), vec!["c"]);

        let in_review = filter_by_status(&rows, Some(StatusKind::InReview), |row| &row.1);
        assert_eq!(in_review.iter().map(|row| row.0).collect::<Vec<_>>(), vec!["d"]);

        assert_eq!(filter_by_status(&rows, None, |row| &row.1).len(), 4);
    }
}

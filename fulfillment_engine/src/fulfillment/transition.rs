use thiserror::Error;

use crate::db_types::ItemStatus;

/// Why a proposed item-status transition was rejected. The display text is the reason reported to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionDenied {
    #[error("unchanged")]
    Unchanged,
    #[error("refunds are issued by the payments subsystem and cannot be requested here")]
    RefundsAreExternal,
    #[error("cannot cancel delivered item")]
    CancelDelivered,
    #[error("invalid transition from {from} to {to}")]
    NotAdjacent { from: ItemStatus, to: ItemStatus },
}

/// Decides whether an item may move from `from` to `to`. Checks run in a fixed order so the most specific reason wins:
/// a no-op is reported as `unchanged` even when the pair would also fail the adjacency table, and cancelling a
/// delivered item gets its own reason even though `DELIVERED` is terminal anyway (callers have been known to bypass
/// the adjacency table for cancellations).
pub fn check_transition(from: ItemStatus, to: ItemStatus) -> Result<(), TransitionDenied> {
    use ItemStatus::*;
    if from == to {
        return Err(TransitionDenied::Unchanged);
    }
    if to == Refunded {
        return Err(TransitionDenied::RefundsAreExternal);
    }
    if from == Delivered && to == Cancelled {
        return Err(TransitionDenied::CancelDelivered);
    }
    match (from, to) {
        (Pending, Accepted | Cancelled) => Ok(()),
        (Accepted, Packing | Cancelled) => Ok(()),
        (Packing, Shipped | Cancelled) => Ok(()),
        (Shipped, Delivered | Cancelled) => Ok(()),
        (from, to) => Err(TransitionDenied::NotAdjacent { from, to }),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ItemStatus::*;

    fn allowed_targets(from: ItemStatus) -> Vec<ItemStatus> {
        match from {
            Pending => vec![Accepted, Cancelled],
            Accepted => vec![Packing, Cancelled],
            Packing => vec![Shipped, Cancelled],
            Shipped => vec![Delivered, Cancelled],
            Delivered | Cancelled | Refunded => vec![],
        }
    }

    #[test]
    fn agrees_with_the_adjacency_table_for_every_pair() {
        for from in ItemStatus::ALL {
            for to in ItemStatus::ALL {
                let expected = from != to && allowed_targets(from).contains(&to);
                let actual = check_transition(from, to).is_ok();
                assert_eq!(actual, expected, "check_transition({from}, {to})");
            }
        }
    }

    #[test]
    fn same_status_is_reported_as_unchanged() {
        for status in ItemStatus::ALL {
            assert_eq!(check_transition(status, status), Err(TransitionDenied::Unchanged));
        }
    }

    #[test]
    fn refunds_are_never_reachable_through_fulfillment() {
        for from in ItemStatus::ALL {
            if from == Refunded {
                continue;
            }
            assert_eq!(check_transition(from, Refunded), Err(TransitionDenied::RefundsAreExternal));
        }
    }

    #[test]
    fn cancelling_a_delivered_item_has_a_distinct_reason() {
        let err = check_transition(Delivered, Cancelled).unwrap_err();
        assert_eq!(err, TransitionDenied::CancelDelivered);
        assert_eq!(err.to_string(), "cannot cancel delivered item");
    }

    #[test]
    fn fallback_reason_names_both_statuses() {
        let err = check_transition(Pending, Delivered).unwrap_err();
        assert_eq!(err.to_string(), "invalid transition from PENDING to DELIVERED");
    }
}

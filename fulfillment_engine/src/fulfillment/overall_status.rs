use crate::db_types::{ItemStatus, OrderStatus};

/// Reduces the multiset of item statuses to the order-level status.
///
/// Rules are evaluated top to bottom and the first match wins; the ordering is load-bearing. One delivered item and
/// one pending item yields `PARTIALLY_DELIVERED`, not `PROCESSING`, because the any-delivered rule is checked before
/// the any-in-progress rule. The result depends only on the multiset, never on item order.
pub fn overall_status(items: &[ItemStatus]) -> OrderStatus {
    use ItemStatus::*;
    if items.is_empty() {
        return OrderStatus::Pending;
    }
    let total = items.len();
    let count = |s: ItemStatus| items.iter().filter(|&&i| i == s).count();
    let refunded = count(Refunded);
    let cancelled = count(Cancelled);
    let delivered = count(Delivered);
    let shipped = count(Shipped);
    let in_progress = count(Accepted) + count(Packing);
    let pending = count(Pending);

    if refunded == total {
        OrderStatus::Refunded
    } else if cancelled == total {
        OrderStatus::Cancelled
    } else if delivered == total {
        OrderStatus::Delivered
    } else if delivered > 0 {
        OrderStatus::PartiallyDelivered
    } else if shipped == total {
        OrderStatus::Shipped
    } else if shipped > 0 {
        OrderStatus::PartiallyShipped
    } else if in_progress > 0 {
        OrderStatus::Processing
    } else if pending + cancelled == total {
        if pending > 0 {
            OrderStatus::Pending
        } else {
            OrderStatus::Cancelled
        }
    } else {
        OrderStatus::Pending
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use ItemStatus::*;

    #[test]
    fn empty_order_is_pending() {
        assert_eq!(overall_status(&[]), OrderStatus::Pending);
    }

    #[test]
    fn uniform_terminal_states() {
        assert_eq!(overall_status(&[Refunded, Refunded]), OrderStatus::Refunded);
        assert_eq!(overall_status(&[Cancelled, Cancelled]), OrderStatus::Cancelled);
        assert_eq!(overall_status(&[Delivered, Delivered, Delivered]), OrderStatus::Delivered);
    }

    #[test]
    fn any_delivered_wins_over_everything_in_flight() {
        assert_eq!(overall_status(&[Delivered, Pending]), OrderStatus::PartiallyDelivered);
        assert_eq!(overall_status(&[Delivered, Packing]), OrderStatus::PartiallyDelivered);
        assert_eq!(overall_status(&[Delivered, Shipped]), OrderStatus::PartiallyDelivered);
    }

    #[test]
    fn shipment_states() {
        assert_eq!(overall_status(&[Shipped, Shipped]), OrderStatus::Shipped);
        assert_eq!(overall_status(&[Shipped, Pending]), OrderStatus::PartiallyShipped);
        // A shipped item outranks items still being worked: any-shipped is checked before any-in-progress.
        assert_eq!(overall_status(&[Shipped, Packing]), OrderStatus::PartiallyShipped);
        // A cancelled sibling keeps a shipped order partial.
        assert_eq!(overall_status(&[Shipped, Cancelled]), OrderStatus::PartiallyShipped);
    }

    #[test]
    fn in_progress_items_make_the_order_processing() {
        assert_eq!(overall_status(&[Accepted, Pending]), OrderStatus::Processing);
        assert_eq!(overall_status(&[Packing, Cancelled]), OrderStatus::Processing);
    }

    #[test]
    fn pending_and_cancelled_residue() {
        assert_eq!(overall_status(&[Pending, Cancelled]), OrderStatus::Pending);
        assert_eq!(overall_status(&[Pending, Pending]), OrderStatus::Pending);
        assert_eq!(overall_status(&[Cancelled, Refunded]), OrderStatus::Pending);
    }

    #[test]
    fn result_is_insensitive_to_item_order() {
        let mut items = vec![Delivered, Pending, Shipped, Cancelled, Packing];
        for _ in 0..items.len() {
            items.rotate_left(1);
            assert_eq!(overall_status(&items), OrderStatus::PartiallyDelivered);
        }
        let mut items = vec![Shipped, Pending, Cancelled];
        for _ in 0..items.len() {
            items.rotate_left(1);
            assert_eq!(overall_status(&items), OrderStatus::PartiallyShipped);
        }
    }
}

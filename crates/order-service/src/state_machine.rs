//! 订单状态机
//!
//! 纯函数校验，不访问存储。允许的迁移：
//!
//! ```text
//! Created    -> InAssembly | Rejected
//! InAssembly -> InDelivery | Rejected
//! InDelivery -> Completed  | Rejected
//! Rejected   -> InAssembly
//! Completed  -> (终态)
//! ```
//!
//! 当前状态与目标状态相同时视为无操作，直接通过。

use oms_shared::error::{OmsError, Result};

use crate::models::{Order, OrderStatus};

/// 给定状态允许迁移到的目标集合
pub fn allowed_targets(current: OrderStatus) -> &'static [OrderStatus] {
    use OrderStatus::*;

    match current {
        Created => &[InAssembly, Rejected],
        InAssembly => &[InDelivery, Rejected],
        InDelivery => &[Completed, Rejected],
        Rejected => &[InAssembly],
        Completed => &[],
    }
}

pub fn can_transition(current: OrderStatus, target: OrderStatus) -> bool {
    current == target || allowed_targets(current).contains(&target)
}

/// 校验单个订单的状态迁移
pub fn validate(order_id: i64, current: OrderStatus, target: OrderStatus) -> Result<()> {
    if can_transition(current, target) {
        return Ok(());
    }

    Err(OmsError::InvalidTransition {
        order_id,
        current: current.to_string(),
        target: target.to_string(),
    })
}

/// 按更新前的状态校验一组订单，遇到第一个非法订单即返回
pub fn validate_all(orders: &[Order], target: OrderStatus) -> Result<()> {
    orders
        .iter()
        .try_for_each(|order| validate(order.id, order.status, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::OrderStatus::*;
    use chrono::Utc;

    fn order(id: i64, status: OrderStatus) -> Order {
        let now = Utc::now();
        Order {
            id,
            customer_id: 1,
            delivery_address: "addr".into(),
            total_price_cents: 0,
            total_price_currency: "RUB".into(),
            status,
            created_at: now,
            updated_at: now,
            order_items: vec![],
        }
    }

    #[test]
    fn test_transition_table_is_exact() {
        let allowed = [
            (Created, InAssembly),
            (Created, Rejected),
            (InAssembly, InDelivery),
            (InAssembly, Rejected),
            (InDelivery, Completed),
            (InDelivery, Rejected),
            (Rejected, InAssembly),
        ];

        for current in OrderStatus::ALL {
            for target in OrderStatus::ALL {
                let expected = current == target || allowed.contains(&(current, target));
                assert_eq!(
                    validate(1, current, target).is_ok(),
                    expected,
                    "{current} -> {target}"
                );
            }
        }
    }

    #[test]
    fn test_same_status_is_noop() {
        for status in OrderStatus::ALL {
            assert!(validate(1, status, status).is_ok());
        }
    }

    #[test]
    fn test_completed_is_terminal() {
        assert!(allowed_targets(Completed).is_empty());
        assert!(validate(1, Completed, Rejected).is_err());
    }

    #[test]
    fn test_invalid_transition_names_order() {
        let err = validate(7, Created, Completed).unwrap_err();
        match err {
            OmsError::InvalidTransition {
                order_id,
                current,
                target,
            } => {
                assert_eq!(order_id, 7);
                assert_eq!(current, "Created");
                assert_eq!(target, "Completed");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_validate_all_reports_first_offender() {
        let orders = vec![order(1, Created), order(2, Completed), order(3, InDelivery)];
        let err = validate_all(&orders, InAssembly).unwrap_err();
        assert!(matches!(err, OmsError::InvalidTransition { order_id: 2, .. }));

        let ok = vec![order(1, Created), order(4, Rejected)];
        assert!(validate_all(&ok, InAssembly).is_ok());
    }
}

//! 订单状态枚举
//!
//! 同时支持数据库（PostgreSQL 枚举 order_status）和 JSON 序列化，
//! 两端都使用 PascalCase 标签（"Created"、"InAssembly"）。

use std::fmt;
use std::str::FromStr;

use oms_shared::error::OmsError;
use serde::{Deserialize, Serialize};

/// 订单状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "order_status")]
pub enum OrderStatus {
    #[default]
    Created,
    Rejected,
    InAssembly,
    InDelivery,
    Completed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        Self::Created,
        Self::Rejected,
        Self::InAssembly,
        Self::InDelivery,
        Self::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "Created",
            Self::Rejected => "Rejected",
            Self::InAssembly => "InAssembly",
            Self::InDelivery => "InDelivery",
            Self::Completed => "Completed",
        }
    }

    /// 精确匹配标签（区分大小写）
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == label)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 解析时忽略大小写，"inassembly" 与 "InAssembly" 等价
impl FromStr for OrderStatus {
    type Err = OmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| OmsError::Validation(format!("不支持的订单状态: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("inassembly".parse::<OrderStatus>().unwrap(), OrderStatus::InAssembly);
        assert_eq!("InAssembly".parse::<OrderStatus>().unwrap(), OrderStatus::InAssembly);
        assert_eq!(" COMPLETED ".parse::<OrderStatus>().unwrap(), OrderStatus::Completed);
    }

    #[test]
    fn test_parse_unknown_is_validation_error() {
        let err = "Shipped".parse::<OrderStatus>().unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
        assert!("".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_from_label_is_exact() {
        assert_eq!(OrderStatus::from_label("Rejected"), Some(OrderStatus::Rejected));
        assert_eq!(OrderStatus::from_label("rejected"), None);
    }

    #[test]
    fn test_serde_uses_pascal_case() {
        let json = serde_json::to_string(&OrderStatus::InDelivery).unwrap();
        assert_eq!(json, "\"InDelivery\"");
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string(), status.as_str());
        }
    }
}

//! HTTP 处理器

pub mod audit;
pub mod order;

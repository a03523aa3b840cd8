use std::time::SystemTime;

use serde::Serialize;
use thiserror::Error;

pub type OrderId = u64;
pub type WorkerId = u64;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("No order with id {0}")]
    OrderNotFound(OrderId),
    #[error("No worker with id {0}")]
    WorkerNotFound(WorkerId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Priority {
    Vip,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderStatus {
    Pending,
    Processing,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub priority: Priority,
    pub status: OrderStatus,
    pub submitted_at: SystemTime,
    pub completed_at: Option<SystemTime>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum WorkerStatus {
    Idle,
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Worker {
    pub id: WorkerId,
    pub status: WorkerStatus,
    /// Back-reference only. The registry owns the order.
    pub assigned_order: Option<OrderId>,
}

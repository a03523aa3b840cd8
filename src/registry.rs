use std::time::SystemTime;

use crate::model::{DispatchError, Order, OrderId, OrderStatus, Priority};

/// Owns the canonical order list. List order is queue order for pending
/// orders; processing and completed orders keep their positions.
#[derive(Debug)]
pub struct OrderRegistry {
    orders: Vec<Order>,
    next_id: OrderId,
}

impl OrderRegistry {
    pub fn new() -> Self {
        OrderRegistry {
            orders: Vec::new(),
            next_id: 1,
        }
    }

    /// Creates a pending order and slots it into the queue. A VIP order goes
    /// behind existing pending VIPs but ahead of every pending normal order;
    /// a normal order goes behind all pending orders. Orders already
    /// processing or completed are never moved.
    pub fn submit(&mut self, priority: Priority) -> Order {
        let order = Order {
            id: self.next_id,
            priority,
            status: OrderStatus::Pending,
            submitted_at: SystemTime::now(),
            completed_at: None,
        };
        self.next_id += 1;

        let previous = std::mem::take(&mut self.orders);
        let (pending, frozen): (Vec<_>, Vec<_>) = previous
            .into_iter()
            .partition(|o| o.status == OrderStatus::Pending);

        match priority {
            Priority::Vip => {
                let (vips, normals): (Vec<_>, Vec<_>) = pending
                    .into_iter()
                    .partition(|o| o.priority == Priority::Vip);
                self.orders.extend(vips);
                self.orders.push(order.clone());
                self.orders.extend(normals);
            }
            Priority::Normal => {
                self.orders.extend(pending);
                self.orders.push(order.clone());
            }
        }
        self.orders.extend(frozen);

        order
    }

    pub fn mark_processing(&mut self, id: OrderId) -> Result<(), DispatchError> {
        self.order_mut(id)?.status = OrderStatus::Processing;
        Ok(())
    }

    pub fn mark_complete(&mut self, id: OrderId) -> Result<(), DispatchError> {
        let order = self.order_mut(id)?;
        order.status = OrderStatus::Complete;
        order.completed_at = Some(SystemTime::now());
        Ok(())
    }

    /// Returns a preempted order to the queue. Status rewrite only: the
    /// order is not re-sorted, so it re-enters behind every pending order.
    pub fn mark_pending(&mut self, id: OrderId) -> Result<(), DispatchError> {
        self.order_mut(id)?.status = OrderStatus::Pending;
        Ok(())
    }

    pub fn all(&self) -> &[Order] {
        &self.orders
    }

    pub fn pending(&self) -> impl Iterator<Item = &Order> {
        self.by_status(OrderStatus::Pending)
    }

    pub fn processing(&self) -> impl Iterator<Item = &Order> {
        self.by_status(OrderStatus::Processing)
    }

    pub fn completed(&self) -> impl Iterator<Item = &Order> {
        self.by_status(OrderStatus::Complete)
    }

    fn by_status(&self, status: OrderStatus) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(move |o| o.status == status)
    }

    fn order_mut(&mut self, id: OrderId) -> Result<&mut Order, DispatchError> {
        self.orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or(DispatchError::OrderNotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_ids(registry: &OrderRegistry) -> Vec<OrderId> {
        registry.pending().map(|o| o.id).collect()
    }

    #[test]
    fn test_ids_monotonic() {
        let mut registry = OrderRegistry::new();
        let a = registry.submit(Priority::Normal);
        let b = registry.submit(Priority::Vip);
        let c = registry.submit(Priority::Normal);
        assert_eq!((a.id, b.id, c.id), (1, 2, 3));
    }

    #[test]
    fn test_normal_orders_are_fifo() {
        let mut registry = OrderRegistry::new();
        registry.submit(Priority::Normal);
        registry.submit(Priority::Normal);
        registry.submit(Priority::Normal);
        assert_eq!(pending_ids(&registry), vec![1, 2, 3]);
    }

    #[test]
    fn test_vip_jumps_pending_normals() {
        let mut registry = OrderRegistry::new();
        registry.submit(Priority::Normal);
        registry.submit(Priority::Normal);
        registry.submit(Priority::Vip);
        assert_eq!(pending_ids(&registry), vec![3, 1, 2]);
    }

    #[test]
    fn test_vip_behind_earlier_vips() {
        let mut registry = OrderRegistry::new();
        registry.submit(Priority::Vip);
        registry.submit(Priority::Normal);
        registry.submit(Priority::Vip);
        assert_eq!(pending_ids(&registry), vec![1, 3, 2]);
    }

    #[test]
    fn test_normal_never_jumps_queue() {
        let mut registry = OrderRegistry::new();
        registry.submit(Priority::Vip);
        registry.submit(Priority::Normal);
        registry.submit(Priority::Normal);
        assert_eq!(pending_ids(&registry), vec![1, 2, 3]);
    }

    #[test]
    fn test_processing_orders_untouched_by_vip_submit() {
        let mut registry = OrderRegistry::new();
        registry.submit(Priority::Normal);
        registry.submit(Priority::Normal);
        registry.mark_processing(1).unwrap();

        registry.submit(Priority::Vip);

        assert_eq!(pending_ids(&registry), vec![3, 2]);
        let processing: Vec<_> = registry.processing().map(|o| o.id).collect();
        assert_eq!(processing, vec![1]);
        assert_eq!(registry.all().len(), 3);
    }

    #[test]
    fn test_complete_sets_timestamp() {
        let mut registry = OrderRegistry::new();
        let order = registry.submit(Priority::Normal);
        assert!(order.completed_at.is_none());

        registry.mark_processing(order.id).unwrap();
        registry.mark_complete(order.id).unwrap();

        let completed: Vec<_> = registry.completed().collect();
        assert_eq!(completed.len(), 1);
        assert!(completed[0].completed_at.is_some());
    }

    #[test]
    fn test_preempted_order_keeps_position() {
        let mut registry = OrderRegistry::new();
        registry.submit(Priority::Normal);
        registry.submit(Priority::Normal);
        registry.mark_processing(1).unwrap();

        registry.mark_pending(1).unwrap();

        // No submit happened while it was processing, so it never moved.
        assert_eq!(pending_ids(&registry), vec![1, 2]);
        assert!(registry.pending().all(|o| o.completed_at.is_none()));
    }

    #[test]
    fn test_preempted_order_rejoins_behind_newer_pendings() {
        let mut registry = OrderRegistry::new();
        registry.submit(Priority::Normal);
        registry.mark_processing(1).unwrap();
        registry.submit(Priority::Normal);
        registry.submit(Priority::Normal);

        // The submits froze the processing order behind the pending block.
        registry.mark_pending(1).unwrap();

        assert_eq!(pending_ids(&registry), vec![2, 3, 1]);
    }

    #[test]
    fn test_unknown_id_is_error() {
        let mut registry = OrderRegistry::new();
        assert!(registry.mark_processing(7).is_err());
        assert!(registry.mark_complete(7).is_err());
        assert!(registry.mark_pending(7).is_err());
    }
}

use crate::model::{DispatchError, OrderId, Worker, WorkerId, WorkerStatus};

/// Owns the worker list in provisioning order. Ids are never reused, even
/// after a worker is removed.
#[derive(Debug)]
pub struct WorkerPool {
    workers: Vec<Worker>,
    next_id: WorkerId,
}

impl WorkerPool {
    pub fn new() -> Self {
        WorkerPool {
            workers: Vec::new(),
            next_id: 1,
        }
    }

    pub fn provision(&mut self) -> Worker {
        let worker = Worker {
            id: self.next_id,
            status: WorkerStatus::Idle,
            assigned_order: None,
        };
        self.next_id += 1;
        self.workers.push(worker.clone());
        worker
    }

    /// Removes the most recently provisioned worker and returns its record,
    /// busy or not, so the caller can unwind a live binding. None when the
    /// pool is empty.
    pub fn deprovision_last(&mut self) -> Option<Worker> {
        self.workers.pop()
    }

    pub fn bind(&mut self, worker_id: WorkerId, order_id: OrderId) -> Result<(), DispatchError> {
        let worker = self.worker_mut(worker_id)?;
        worker.status = WorkerStatus::Busy;
        worker.assigned_order = Some(order_id);
        Ok(())
    }

    pub fn release(&mut self, worker_id: WorkerId) -> Result<(), DispatchError> {
        let worker = self.worker_mut(worker_id)?;
        worker.status = WorkerStatus::Idle;
        worker.assigned_order = None;
        Ok(())
    }

    pub fn all(&self) -> &[Worker] {
        &self.workers
    }

    pub fn idle(&self) -> impl Iterator<Item = &Worker> {
        self.workers
            .iter()
            .filter(|w| w.status == WorkerStatus::Idle)
    }

    fn worker_mut(&mut self, id: WorkerId) -> Result<&mut Worker, DispatchError> {
        self.workers
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or(DispatchError::WorkerNotFound(id))
    }
}

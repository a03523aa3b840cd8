use std::{collections::HashMap, time::Duration};

use log::{error, info, trace};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::{
    model::{DispatchError, Order, OrderId, OrderStatus, Priority, Worker, WorkerId},
    pool::WorkerPool,
    registry::OrderRegistry,
};

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub processing_duration: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            processing_duration: Duration::from_secs(10),
        }
    }
}

/// Single owner of all dispatch state. Commands are applied one at a time,
/// and every state change ends with an assignment pass, so idle workers and
/// pending orders never coexist between commands.
pub struct Scheduler {
    cancellation_token: CancellationToken,
    command_tx: mpsc::Sender<Command>,
    config: SchedulerConfig,
    orders: OrderRegistry,
    workers: WorkerPool,
    timers: HashMap<WorkerId, CancellationToken>,
}

#[derive(Clone)]
pub struct SchedulerHandle {
    cancellation_token: CancellationToken,
    command_tx: mpsc::Sender<Command>,
}

/// Read model for display consumers. `active` holds pending and processing
/// orders in queue order; `completed` holds finished orders.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub active: Vec<Order>,
    pub completed: Vec<Order>,
    pub workers: Vec<Worker>,
}

enum Command {
    SubmitOrder {
        priority: Priority,
        result_tx: oneshot::Sender<Order>,
    },
    AddWorker {
        result_tx: oneshot::Sender<Worker>,
    },
    RemoveWorker,
    OrderProcessed {
        worker_id: WorkerId,
        order_id: OrderId,
    },
    TakeSnapshot {
        result_tx: oneshot::Sender<Snapshot>,
    },
}

impl Scheduler {
    pub fn run(config: SchedulerConfig) -> SchedulerHandle {
        info!(
            "Scheduler starting. Processing duration {:?}",
            config.processing_duration
        );

        let cancellation_token = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::channel(1000);

        let scheduler = Scheduler {
            cancellation_token,
            command_tx,
            config,
            orders: OrderRegistry::new(),
            workers: WorkerPool::new(),
            timers: HashMap::new(),
        };
        let handle = scheduler.handle();

        tokio::spawn(command_loop(command_rx, scheduler));

        handle
    }

    fn handle_command(&mut self, command: Command) -> Result<(), DispatchError> {
        match command {
            Command::SubmitOrder {
                priority,
                result_tx,
            } => {
                let order = self.orders.submit(priority);
                info!("Order {} submitted ({:?})", order.id, priority);
                let _ = result_tx.send(order);
                self.run_assignment_pass()
            }
            Command::AddWorker { result_tx } => {
                let worker = self.workers.provision();
                info!("Worker {} provisioned", worker.id);
                let _ = result_tx.send(worker);
                self.run_assignment_pass()
            }
            Command::RemoveWorker => self.handle_remove_worker(),
            Command::OrderProcessed {
                worker_id,
                order_id,
            } => self.handle_order_processed(worker_id, order_id),
            Command::TakeSnapshot { result_tx } => {
                let _ = result_tx.send(self.snapshot());
                Ok(())
            }
        }
    }

    fn handle_remove_worker(&mut self) -> Result<(), DispatchError> {
        let Some(worker) = self.workers.deprovision_last() else {
            trace!("Remove worker ignored: pool empty");
            return Ok(());
        };

        if let Some(timer) = self.timers.remove(&worker.id) {
            timer.cancel();
        }

        match worker.assigned_order {
            Some(order_id) => {
                self.orders.mark_pending(order_id)?;
                info!(
                    "Worker {} removed while busy. Order {} back to pending",
                    worker.id, order_id
                );
            }
            None => info!("Worker {} removed", worker.id),
        }

        self.run_assignment_pass()
    }

    fn handle_order_processed(
        &mut self,
        worker_id: WorkerId,
        order_id: OrderId,
    ) -> Result<(), DispatchError> {
        // A completion that lost the race with a removal has no timer entry
        // left. The order is already back in the queue; drop the event.
        if self.timers.remove(&worker_id).is_none() {
            trace!("Stale completion for worker {} ignored", worker_id);
            return Ok(());
        }

        self.orders.mark_complete(order_id)?;
        self.workers.release(worker_id)?;
        info!("Order {} complete. Worker {} idle", order_id, worker_id);

        self.run_assignment_pass()
    }

    /// Pairs the k-th idle worker with the k-th pending order. Greedy and
    /// non-preemptive: orders already processing are never reassigned.
    fn run_assignment_pass(&mut self) -> Result<(), DispatchError> {
        let pairs: Vec<(WorkerId, OrderId)> = self
            .workers
            .idle()
            .zip(self.orders.pending())
            .map(|(worker, order)| (worker.id, order.id))
            .collect();

        for (worker_id, order_id) in pairs {
            self.begin_processing(worker_id, order_id)?;
        }

        Ok(())
    }

    fn begin_processing(
        &mut self,
        worker_id: WorkerId,
        order_id: OrderId,
    ) -> Result<(), DispatchError> {
        self.workers.bind(worker_id, order_id)?;
        self.orders.mark_processing(order_id)?;

        // Child of the root token, so scheduler teardown cancels every
        // outstanding timer.
        let timer = self.cancellation_token.child_token();
        self.timers.insert(worker_id, timer.clone());
        tokio::spawn(completion_timer(
            worker_id,
            order_id,
            self.config.processing_duration,
            timer,
            self.handle(),
        ));

        info!("Worker {} processing order {}", worker_id, order_id);
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            active: self
                .orders
                .all()
                .iter()
                .filter(|o| o.status != OrderStatus::Complete)
                .cloned()
                .collect(),
            completed: self.orders.completed().cloned().collect(),
            workers: self.workers.all().to_vec(),
        }
    }

    fn handle(&self) -> SchedulerHandle {
        SchedulerHandle {
            cancellation_token: self.cancellation_token.clone(),
            command_tx: self.command_tx.clone(),
        }
    }
}

async fn command_loop(mut command_rx: mpsc::Receiver<Command>, mut scheduler: Scheduler) {
    let handle = scheduler.handle();
    loop {
        let command = tokio::select! {
            v = command_rx.recv() => v,
            _ = handle.wait_shutdown() => return,
        };
        let Some(command) = command else { return };

        if let Err(e) = scheduler.handle_command(command) {
            // Transitions only ever reference ids the scheduler bound
            // itself, so this is an internal invariant violation.
            error!("Scheduler state corrupt: {}. Shutting down", e);
            handle.shutdown();
            return;
        }
    }
}

async fn completion_timer(
    worker_id: WorkerId,
    order_id: OrderId,
    duration: Duration,
    cancel: CancellationToken,
    handle: SchedulerHandle,
) {
    tokio::select! {
        _ = tokio::time::sleep(duration) => {}
        _ = cancel.cancelled() => return,
    }
    handle.order_processed(worker_id, order_id).await;
}

impl SchedulerHandle {
    /// None only if the scheduler has already shut down.
    pub async fn submit_order(&self, priority: Priority) -> Option<Order> {
        let (result_tx, result_rx) = oneshot::channel();
        let _ = self
            .command_tx
            .send(Command::SubmitOrder {
                priority,
                result_tx,
            })
            .await;
        result_rx.await.ok()
    }

    pub async fn add_worker(&self) -> Option<Worker> {
        let (result_tx, result_rx) = oneshot::channel();
        let _ = self.command_tx.send(Command::AddWorker { result_tx }).await;
        result_rx.await.ok()
    }

    /// Removes the most recently added worker. Silent no-op when the pool
    /// is empty.
    pub async fn remove_worker(&self) {
        let _ = self.command_tx.send(Command::RemoveWorker).await;
    }

    pub async fn snapshot(&self) -> Option<Snapshot> {
        let (result_tx, result_rx) = oneshot::channel();
        let _ = self
            .command_tx
            .send(Command::TakeSnapshot { result_tx })
            .await;
        result_rx.await.ok()
    }

    pub async fn active_orders(&self) -> Option<Vec<Order>> {
        self.snapshot().await.map(|s| s.active)
    }

    pub async fn completed_orders(&self) -> Option<Vec<Order>> {
        self.snapshot().await.map(|s| s.completed)
    }

    pub async fn workers(&self) -> Option<Vec<Worker>> {
        self.snapshot().await.map(|s| s.workers)
    }

    async fn order_processed(&self, worker_id: WorkerId, order_id: OrderId) {
        let _ = self
            .command_tx
            .send(Command::OrderProcessed {
                worker_id,
                order_id,
            })
            .await;
    }

    pub fn shutdown(&self) {
        self.cancellation_token.cancel();
    }

    pub fn wait_shutdown(&self) -> WaitForCancellationFuture {
        self.cancellation_token.cancelled()
    }
}

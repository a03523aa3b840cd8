use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};

use order_dispatch::{
    model::Priority,
    scheduler::{Scheduler, SchedulerConfig, SchedulerHandle},
};

#[tokio::main]
async fn main() {
    flexi_logger::Logger::try_with_str("info")
        .unwrap()
        .adaptive_format_for_stdout(flexi_logger::AdaptiveFormat::WithThread)
        .log_to_stdout()
        .start()
        .unwrap();

    let scheduler = Scheduler::run(SchedulerConfig::default());

    tokio::select! {
        _ = console_loop(scheduler.clone()) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Shutting down");
        }
        _ = scheduler.wait_shutdown() => {}
    };
    scheduler.shutdown();

    info!("Scheduler shutdown");
}

async fn console_loop(scheduler: SchedulerHandle) {
    println!("commands: normal | vip | add | remove | status | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match line.trim() {
            "normal" => {
                if let Some(order) = scheduler.submit_order(Priority::Normal).await {
                    println!("order {} queued", order.id);
                }
            }
            "vip" => {
                if let Some(order) = scheduler.submit_order(Priority::Vip).await {
                    println!("order {} queued (VIP)", order.id);
                }
            }
            "add" => {
                if let Some(worker) = scheduler.add_worker().await {
                    println!("worker {} added", worker.id);
                }
            }
            "remove" => scheduler.remove_worker().await,
            "status" => {
                if let Some(snapshot) = scheduler.snapshot().await {
                    println!("{}", serde_json::to_string_pretty(&snapshot).unwrap());
                }
            }
            "quit" => return,
            "" => {}
            other => println!("unknown command: {}", other),
        }
    }
}

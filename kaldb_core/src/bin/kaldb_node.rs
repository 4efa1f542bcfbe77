use std::time::Duration;

use kaldb_config::node::load_node_config;
use kaldb_core::{initialize_components, setup_sigint_handler};
use kaldb_logs::telemetry::{get_subscriber, init_subscriber, set_panic_hook};
use kaldb_utils::wait_for_tasks::wait_for_tasks;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (subscriber, _guard) = get_subscriber("kaldb".into(), "info".into());
    init_subscriber(subscriber);
    set_panic_hook();

    let node_config = load_node_config().expect("failed to load node config");
    kaldb_logs::info!(
        "Starting node {} with role {}",
        node_config.name,
        node_config.role
    );

    let (core_task_handles, stop_sender) = initialize_components(&node_config)
        .await
        .expect("Unable to start node components");

    kaldb_logs::info!("Running {} core task handlers", core_task_handles.len());
    let sigint_receiver = setup_sigint_handler();

    let graceful_shutdown = None::<futures::future::Ready<()>>;
    tokio::select! {
        _ = wait_for_tasks(core_task_handles, graceful_shutdown, false) => {},
        _ = sigint_receiver => {
            kaldb_logs::info!("Stop signal received, shutting down");
        },
    }
    stop_sender.send(true).ok();
    tokio::time::sleep(Duration::from_secs(5)).await;
    kaldb_logs::info!("Stopped");
    Ok(())
}

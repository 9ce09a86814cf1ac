use campaign_core::prelude::ShutdownHandle;
use tokio::signal;

/// Listen for Ctrl-C on `runtime` and turn it into a campaign shutdown.
pub fn start_shutdown_listener(
    runtime: &tokio::runtime::Runtime,
) -> anyhow::Result<ShutdownHandle> {
    let handle = ShutdownHandle::default();

    let listener_handle = handle.clone();
    runtime.spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                listener_handle.shutdown();
                println!("Received shutdown signal, finishing the current run...");
            }
            Err(e) => log::error!("Failed to listen for Ctrl-C: {e}"),
        }
    });

    Ok(handle)
}

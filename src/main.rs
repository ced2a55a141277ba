/// Starts the agent with `info` logging unless `RUST_LOG` says otherwise.
///
/// ```bash
/// MONITORING_API_TOKEN=s3cret RUST_LOG=debug cargo run
/// ```
#[tokio::main]
async fn main() -> std::process::ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    match host_pulse::run().await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            std::process::ExitCode::FAILURE
        }
    }
}

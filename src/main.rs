use anyhow::{Context, Result};
use liquidfan::{arg_parser::ArgsOptions, config::Config, logger};
use tokio::{
    select,
    signal::{
        ctrl_c,
        unix::{SignalKind, signal},
    },
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    logger::init_logging();

    // Parse the command line arguments
    let args_options = ArgsOptions::parse();

    if let Err(err) = run(args_options).await {
        for e in err.chain() {
            error!("{e}");
        }

        return Err(err);
    }

    Ok(())
}

async fn run(args_options: ArgsOptions) -> Result<()> {
    let mut config = match &args_options.config_file_path {
        Some(path) => Config::load(path)?,
        None => {
            info!("No configuration file given, using the built-in defaults");
            Config::default()
        }
    };

    if let Some(interval_ms) = args_options.interval_ms {
        config.interval_ms = interval_ms;
    }

    let mut control_loop = config
        .build_loop()
        .with_context(|| "Failed to build the control loop")?;

    // This token and tracker will be used to handle graceful shutdown
    let tracker = TaskTracker::new();
    let token = CancellationToken::new();

    let handle = {
        let token = token.clone();

        tracker.spawn(async move {
            // Wake up the main task if the loop stops on its own
            let _guard = token.clone().drop_guard();
            control_loop.run(token).await
        })
    };

    let mut terminate = signal(SignalKind::terminate())
        .with_context(|| "Failed to register the SIGTERM handler")?;

    select! {
        res = ctrl_c() => {
            match res {
                Ok(()) => info!("Received ctrl-c"),
                Err(err) => error!("Failed to listen for ctrl-c: {err}"),
            }
        },
        _ = terminate.recv() => { info!("Received SIGTERM"); },
        _ = token.cancelled() => {},
    }

    // Cancel the token to communicate the program
    // termination to the running tasks
    token.cancel();

    // Wait for the tasks to finish
    tracker.close();
    tracker.wait().await;

    handle
        .await
        .with_context(|| "Control loop task panicked")?
        .with_context(|| "Control loop failed")?;

    Ok(())
}

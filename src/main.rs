// src/main.rs

use devloop::errors::DevloopError;
use devloop::{cli, logging, run};

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        // The program's own failure: its output already explains it.
        if let Some(DevloopError::ProcessFailed(failure)) = err.downcast_ref::<DevloopError>() {
            std::process::exit(failure.exit_code());
        }
        eprintln!("devloop error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}

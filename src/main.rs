// src/main.rs

use streamvisor::{Outcome, cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(outcome) => std::process::exit(outcome.code()),
        Err(err) => {
            eprintln!("streamvisor error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<Outcome> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}

use std::process;

use clap::Parser;
use log::{error, info, warn};

use bucketctl::cli::{normalize_args, Cli};
use bucketctl::{dispatch, Config, Error, S3Store};

async fn run(cli: Cli) -> Result<(), Error> {
    let config = Config::load(&cli.config)?;
    let invocation = cli.invocation()?;
    let mut store = S3Store::from_config(&config)?;

    if invocation.mode.is_some() && config.region.is_none() {
        match store.bucket_region(&invocation.bucket).await {
            Ok(region) => {
                info!("bucket {} is in {}", invocation.bucket, region);
                store.set_region(region);
            }
            Err(Error::ServerError { ref code, .. }) if code == "AccessDenied" => {
                warn!("bucket location is not accessible, using {}", store.region);
            }
            Err(e) => return Err(e),
        }
    }

    dispatch::run(&invocation, &store).await
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse_from(normalize_args(std::env::args_os()));
    if let Err(e) = run(cli).await {
        error!("{}", e);
        process::exit(1);
    }
}

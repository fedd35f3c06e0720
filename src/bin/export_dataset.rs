use signalbot::config::BotConfig;
use signalbot::dataset::{collect_rows, write_csv};
use signalbot::quotes::TwelveDataClient;

use anyhow::{Result, bail};
use log::info;
use std::env;
use std::path::Path;

fn main() -> Result<()> {
    if env::var("RUST_LOG").is_err() {
        unsafe {
            env::set_var("RUST_LOG", "info");
        }
    }
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let config_file = args.get(1).map(String::as_str).unwrap_or("config.json");
    let config = BotConfig::load_from_file(config_file)?;

    let quotes = TwelveDataClient::from_env(&config.quotes.base_url, &config.quotes.api_key_env)?;
    let rows = collect_rows(
        &quotes,
        &config.instruments,
        &config.sampling_interval,
        config.lookback_days,
    );
    if rows.is_empty() {
        bail!("Could not build the dataset. Check the API key and symbols.");
    }

    let path = Path::new(&config.dataset_path);
    write_csv(path, &rows)?;
    info!("Dataset saved: {} ({} rows)", path.display(), rows.len());
    Ok(())
}

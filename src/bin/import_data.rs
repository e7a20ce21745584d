// src/bin/import_data.rs
//
// Usage:
//   import_data default          load the bundled sample dataset
//   import_data listings.csv     upload a CSV file
use anyhow::{bail, Context};
use dotenv::dotenv;
use std::env;
use std::fs;
use std::path::Path;

use location_dashboard::services::api_client::{ApiClient, PropertyBackend};
use location_dashboard::services::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let Some(target) = env::args().nth(1) else {
        bail!("usage: import_data <default | file.csv>");
    };

    let config = Config::from_env();
    let client = ApiClient::new(config.backend_url.clone(), config.http_timeout)
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let result = if target == "default" {
        client.import_default_data().await
    } else {
        let path = Path::new(&target);
        let contents = fs::read(path).with_context(|| format!("reading {}", target))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| target.clone());
        client.upload_csv(&file_name, contents).await
    };

    match result {
        Ok(result) => {
            println!("{}", result.message);
            Ok(())
        }
        Err(e) => bail!("import failed: {}", e),
    }
}

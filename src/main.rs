use anyhow::Result;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use vendor_access::config::Settings;
use vendor_access::{ListParams, RecordId, VendorDataService};

const USAGE: &str = "usage: main <vendors [status] | vendor <id> | statistics | quotations | approved | events>";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::new()?;
    let service = VendorDataService::new(&settings).await?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("vendors");

    let output: Value = match command {
        "vendors" => {
            let params = match args.get(1) {
                Some(status) => ListParams::new().status(status.as_str()),
                None => ListParams::new(),
            };
            serde_json::to_value(service.list_vendors(&params).await?)?
        }
        "vendor" => {
            let id = args
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("{}", USAGE))?;
            service.get_vendor(&RecordId::parse(id)).await?.into_value()
        }
        "statistics" => service.statistics().await?.into_value(),
        "quotations" => serde_json::to_value(service.list_quotations(&ListParams::new()).await?)?,
        "approved" => serde_json::to_value(service.approved_quotations().await?)?,
        "events" => serde_json::to_value(service.organizer_events().await?)?,
        _ => anyhow::bail!("{}", USAGE),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);

    if let Some(origin) = service.last_origin() {
        println!("Data origin: {}", origin);
    }

    Ok(())
}

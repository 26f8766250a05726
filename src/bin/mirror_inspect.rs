use anyhow::Result;
use std::sync::Arc;

use vendor_access::config::Settings;
use vendor_access::storage::{Collection, FileStore, PersistentMirror};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::new()?;
    let dir = settings.origin_storage_dir();

    println!("Mirror directory: {}", dir.display());

    let store = Arc::new(FileStore::new(&dir).await?);
    let mirror = PersistentMirror::open(store).await;

    for collection in Collection::ALL {
        let records = mirror.load(collection).await;
        let local = records
            .iter()
            .filter(|r| r.id().map(|id| id.is_local()).unwrap_or(false))
            .count();

        println!(
            "\n{} ({} records, {} created offline, key {})",
            collection.label(),
            records.len(),
            local,
            collection.storage_key()
        );
        println!("{}", serde_json::to_string_pretty(&records)?);

        let buried = mirror.buried(collection).await;
        if !buried.is_empty() {
            println!("Deleted locally: {}", serde_json::to_string(&buried)?);
        }
    }

    Ok(())
}

//! Minimal embedding example for storewatch-core
//!
//! This example runs the reconciliation engine inside a custom application
//! with its own probe and an in-memory sheet. The application decides when
//! each run happens.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use storewatch_core::config::StoreConfig;
use storewatch_core::store::MemoryTabularStore;
use storewatch_core::traits::{AppMetadata, StoreProbe};
use storewatch_core::{Error, MonitorConfig, MonitorEngine, Result};

/// Probe answering from an application-owned catalog
struct CatalogProbe {
    listed: Arc<Mutex<HashSet<String>>>,
}

#[async_trait::async_trait]
impl StoreProbe for CatalogProbe {
    async fn lookup(&self, package_id: &str) -> Result<AppMetadata> {
        let listed = self
            .listed
            .lock()
            .map_err(|_| Error::probe("catalog lock poisoned"))?
            .contains(package_id);

        if listed {
            Ok(AppMetadata::empty().with_released(1_700_000_000))
        } else {
            Err(Error::not_found(format!("{} is not in the catalog", package_id)))
        }
    }

    fn probe_name(&self) -> &'static str {
        "catalog"
    }
}

fn row(seq: &str, package: &str) -> Vec<String> {
    let mut cells = vec![String::new(); 8];
    cells[0] = seq.to_string();
    cells[7] = package.to_string();
    cells
}

async fn print_sheet(sheet: &MemoryTabularStore) {
    let workbook = sheet.workbook().await;
    for cells in workbook.rows.iter().skip(1) {
        println!("   {:?}", cells);
    }
    println!("   available: {:?}", sheet.cell("J2").await);
    if let Some(log) = workbook.log {
        println!("   change log:");
        for entry in log {
            println!("     {:?}", entry);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Embedded storewatch-core Example ===\n");

    let catalog: HashSet<String> = ["com.example.alpha", "com.example.beta"]
        .iter()
        .map(|p| p.to_string())
        .collect();
    let listed = Arc::new(Mutex::new(catalog));

    let sheet = MemoryTabularStore::with_rows(vec![
        row("1", "com.example.alpha"),
        row("2", "com.example.beta"),
        row("3", "com.example.gamma"),
    ]);

    let mut config = MonitorConfig::new(StoreConfig::Memory);
    config.engine.throttle_ms = 0;

    println!("1. Creating engine...");
    let probe = CatalogProbe {
        listed: Arc::clone(&listed),
    };
    let (engine, mut event_rx) =
        MonitorEngine::new(Box::new(probe), Box::new(sheet.clone()), config)?;

    let event_listener = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            println!("[Event] {:?}", event);
        }
    });

    println!("2. First run: every row is new");
    let report = engine.run_once().await?;
    println!("   {} available, {} unavailable", report.available, report.unavailable);
    print_sheet(&sheet).await;

    println!("\n3. beta leaves the store, gamma appears");
    if let Ok(mut catalog) = listed.lock() {
        catalog.remove("com.example.beta");
        catalog.insert("com.example.gamma".to_string());
    }

    let report = engine.run_once().await?;
    println!(
        "   {} available, {} unavailable, {} change(s)",
        report.available, report.unavailable, report.events_logged
    );
    print_sheet(&sheet).await;

    drop(engine);
    let _ = event_listener.await;

    println!("\n=== Embedding Successful ===");
    Ok(())
}

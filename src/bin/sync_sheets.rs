//! One-shot spreadsheet import.
//!
//! Usage: `cargo run --bin sync-sheets`
//!
//! Reads the same environment as the server (DATABASE_URL, GOOGLE_SHEETS_*),
//! runs a single create-if-absent sync and prints the per-row report.

use anyhow::Context;
use carlos_dashboard_api::config::Config;
use carlos_dashboard_api::db;
use carlos_dashboard_api::sheets_client::GoogleSheetsClient;
use carlos_dashboard_api::sync::{self, RowOutcome};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carlos_dashboard_api=info,sync_sheets=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let settings = config.sheets_settings().context(
        "Configuración de Google Sheets no encontrada: set GOOGLE_SHEETS_SERVICE_ACCOUNT_FILE and GOOGLE_SHEETS_SPREADSHEET_ID",
    )?;

    let store = db::open_store(&config).await?;
    let client = GoogleSheetsClient::new(&settings)?;

    let report = sync::sync_from_spreadsheet(store.as_ref(), &client).await?;

    println!("\n📊 SYNC REPORT");
    println!("═══════════════════════════════════════");
    for row in &report.rows {
        let telefono = row.telefono.as_deref().unwrap_or("-");
        match &row.outcome {
            RowOutcome::Created => println!("  row {:>4}  {:<20} created", row.row, telefono),
            RowOutcome::Existing => println!("  row {:>4}  {:<20} existing", row.row, telefono),
            RowOutcome::Skipped { reason } => {
                println!("  row {:>4}  {:<20} skipped ({})", row.row, telefono, reason)
            }
            RowOutcome::Failed { error } => {
                println!("  row {:>4}  {:<20} FAILED: {}", row.row, telefono, error)
            }
        }
    }
    println!("═══════════════════════════════════════");
    println!(
        "Created: {}  Existing: {}  Skipped: {}  Failed: {}",
        report.created, report.existing, report.skipped, report.failed
    );
    println!(
        "Sincronización completada. {} registros procesados.",
        report.processed()
    );

    Ok(())
}

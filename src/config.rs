/// Google Sheets connection settings, present only when both values are configured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetsSettings {
    pub service_account_file: String,
    pub spreadsheet_id: String,
    pub api_base_url: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>, // None falls back to the in-memory store
    pub port: u16,
    pub webhook_secret: Option<String>,
    pub sheets_service_account_file: Option<String>,
    pub sheets_spreadsheet_id: Option<String>,
    pub sheets_api_base_url: String,
    pub sync_interval_secs: Option<u64>,
    pub snapshot_interval_secs: u64,
    pub rate_limit_per_second: u64,
    pub rate_limit_burst: u32,
}

pub const DEFAULT_SHEETS_API_BASE_URL: &str = "https://sheets.googleapis.com";

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            database_url: optional_var("DB_URL")
                .or_else(|| optional_var("DATABASE_URL"))
                .map(|url| {
                    if !url.starts_with("postgresql://") && !url.starts_with("postgres://") {
                        anyhow::bail!("DB_URL must start with postgresql:// or postgres://");
                    }
                    Ok(url)
                })
                .transpose()?,
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            webhook_secret: optional_var("WEBHOOK_SECRET"),
            sheets_service_account_file: optional_var("GOOGLE_SHEETS_SERVICE_ACCOUNT_FILE"),
            sheets_spreadsheet_id: optional_var("GOOGLE_SHEETS_SPREADSHEET_ID"),
            sheets_api_base_url: optional_var("GOOGLE_SHEETS_API_BASE_URL")
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!(
                            "GOOGLE_SHEETS_API_BASE_URL must start with http:// or https://"
                        );
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })
                .transpose()?
                .unwrap_or_else(|| DEFAULT_SHEETS_API_BASE_URL.to_string()),
            sync_interval_secs: optional_var("SYNC_INTERVAL_SECS")
                .map(|v| parse_positive("SYNC_INTERVAL_SECS", &v))
                .transpose()?,
            snapshot_interval_secs: optional_var("METRICS_SNAPSHOT_INTERVAL_SECS")
                .map(|v| parse_positive("METRICS_SNAPSHOT_INTERVAL_SECS", &v))
                .transpose()?
                .unwrap_or(3600),
            rate_limit_per_second: optional_var("RATE_LIMIT_PER_SECOND")
                .map(|v| parse_positive("RATE_LIMIT_PER_SECOND", &v))
                .transpose()?
                .unwrap_or(10),
            rate_limit_burst: optional_var("RATE_LIMIT_BURST")
                .map(|v| parse_positive("RATE_LIMIT_BURST", &v))
                .transpose()?
                .map(|v| v.min(u32::MAX as u64) as u32)
                .unwrap_or(20),
        };

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        match config.database_url {
            Some(ref url) => tracing::debug!("Database URL: {}...", url_preview(url)),
            None => tracing::warn!("DATABASE_URL not set, leads will be kept in memory"),
        }
        if config.webhook_secret.is_none() {
            tracing::warn!("WEBHOOK_SECRET not set, webhook requests are not authenticated");
        }
        if config.sheets_settings().is_none() {
            tracing::warn!("Google Sheets sync not configured");
        }
        tracing::debug!("Sheets API Base URL: {}", config.sheets_api_base_url);
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Sheets settings when both the credential path and spreadsheet id are non-empty.
    pub fn sheets_settings(&self) -> Option<SheetsSettings> {
        let service_account_file = self.sheets_service_account_file.clone()?;
        let spreadsheet_id = self.sheets_spreadsheet_id.clone()?;
        if service_account_file.trim().is_empty() || spreadsheet_id.trim().is_empty() {
            return None;
        }
        Some(SheetsSettings {
            service_account_file,
            spreadsheet_id,
            api_base_url: self.sheets_api_base_url.clone(),
        })
    }
}

/// First 20 characters, enough to tell hosts apart without printing credentials.
fn url_preview(url: &str) -> String {
    url.chars().take(20).collect()
}

fn optional_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.trim().is_empty())
}

fn parse_positive(name: &str, value: &str) -> anyhow::Result<u64> {
    match value.trim().parse::<u64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => anyhow::bail!("{} must be a positive integer", name),
    }
}

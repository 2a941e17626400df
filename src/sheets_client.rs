use crate::config::SheetsSettings;
use crate::errors::AppError;
use async_trait::async_trait;
use moka::future::Cache;
use reqwest::Url;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

/// One worksheet row keyed by header name.
pub type SheetRecord = Map<String, Value>;

const SHEETS_SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/spreadsheets.readonly",
    "https://www.googleapis.com/auth/drive.readonly",
];

/// Access tokens live one hour; refresh a little before that.
const TOKEN_TTL: Duration = Duration::from_secs(50 * 60);

/// Source of spreadsheet rows for the sync.
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// All records of the first worksheet, header row excluded.
    async fn fetch_records(&self) -> Result<Vec<SheetRecord>, AppError>;
}

#[derive(Clone)]
enum SheetsAuth {
    ServiceAccount {
        key_path: String,
        token_cache: Cache<String, String>,
    },
    Static(String),
}

/// Client for the Google Sheets v4 REST API.
#[derive(Clone)]
pub struct GoogleSheetsClient {
    client: reqwest::Client,
    base_url: String,
    spreadsheet_id: String,
    auth: SheetsAuth,
}

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
    #[serde(default)]
    index: i64,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<Value>>,
}

impl GoogleSheetsClient {
    /// Creates a client authenticating with the service account key at `settings.service_account_file`.
    pub fn new(settings: &SheetsSettings) -> Result<Self, AppError> {
        let token_cache = Cache::builder()
            .time_to_live(TOKEN_TTL)
            .max_capacity(16)
            .build();

        Self::build(
            settings.api_base_url.clone(),
            settings.spreadsheet_id.clone(),
            SheetsAuth::ServiceAccount {
                key_path: settings.service_account_file.clone(),
                token_cache,
            },
        )
    }

    /// Creates a client that sends a fixed bearer token (tests, pre-issued tokens).
    pub fn with_static_token(
        base_url: String,
        spreadsheet_id: String,
        token: String,
    ) -> Result<Self, AppError> {
        Self::build(base_url, spreadsheet_id, SheetsAuth::Static(token))
    }

    fn build(base_url: String, spreadsheet_id: String, auth: SheetsAuth) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create Sheets client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            spreadsheet_id,
            auth,
        })
    }

    /// Obtains an access token, reusing a cached one while it is fresh.
    pub async fn authenticate(&self) -> Result<String, AppError> {
        let (key_path, token_cache) = match &self.auth {
            SheetsAuth::Static(token) => return Ok(token.clone()),
            SheetsAuth::ServiceAccount {
                key_path,
                token_cache,
            } => (key_path, token_cache),
        };

        if let Some(token) = token_cache.get(key_path).await {
            tracing::debug!("Using cached Google access token");
            return Ok(token);
        }

        let key = yup_oauth2::read_service_account_key(key_path)
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!(
                    "Failed to read service account credentials: {}",
                    e
                ))
            })?;

        let authenticator = yup_oauth2::ServiceAccountAuthenticator::builder(key)
            .build()
            .await
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to build Google authenticator: {}", e))
            })?;

        let access_token = authenticator.token(SHEETS_SCOPES).await.map_err(|e| {
            AppError::ExternalApiError(format!("Google authentication failed: {}", e))
        })?;

        let token = access_token
            .token()
            .map(str::to_string)
            .ok_or_else(|| {
                AppError::ExternalApiError("Google returned an empty access token".to_string())
            })?;

        token_cache.insert(key_path.clone(), token.clone()).await;
        tracing::info!("✓ Authenticated with Google service account");
        Ok(token)
    }

    fn spreadsheet_url(&self, extra_segments: &[&str]) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::ExternalApiError(format!("Invalid Sheets base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::ExternalApiError("Sheets base URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()])
            .extend(extra_segments);
        Ok(url)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        token: &str,
    ) -> Result<T, AppError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Sheets request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::error!("Sheets API returned error {}: {}", status, error_text);
            return Err(AppError::ExternalApiError(format!(
                "Sheets API returned status {}: {}",
                status, error_text
            )));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse Sheets response: {}", e))
        })
    }

    /// Title of the worksheet with the lowest index.
    pub async fn first_worksheet_title(&self, token: &str) -> Result<String, AppError> {
        let mut url = self.spreadsheet_url(&[])?;
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties(title,index)");

        tracing::info!("Opening spreadsheet {}", self.spreadsheet_id);
        let meta: SpreadsheetMeta = self.get_json(url, token).await?;

        meta.sheets
            .into_iter()
            .min_by_key(|s| s.properties.index)
            .map(|s| s.properties.title)
            .ok_or_else(|| {
                AppError::ExternalApiError(format!(
                    "Spreadsheet {} has no worksheets",
                    self.spreadsheet_id
                ))
            })
    }

    /// Reads a whole worksheet as header-keyed records.
    pub async fn read_worksheet(
        &self,
        token: &str,
        title: &str,
    ) -> Result<Vec<SheetRecord>, AppError> {
        let range = format!("'{}'", title.replace('\'', "''"));
        let mut url = self.spreadsheet_url(&["values", range.as_str()])?;
        url.query_pairs_mut()
            .append_pair("majorDimension", "ROWS")
            .append_pair("valueRenderOption", "UNFORMATTED_VALUE");

        let values: ValueRange = self.get_json(url, token).await?;
        let records = rows_to_records(values.values);
        tracing::info!("Read {} record(s) from worksheet '{}'", records.len(), title);
        Ok(records)
    }
}

#[async_trait]
impl SheetSource for GoogleSheetsClient {
    async fn fetch_records(&self) -> Result<Vec<SheetRecord>, AppError> {
        let token = self.authenticate().await?;
        let title = self.first_worksheet_title(&token).await?;
        self.read_worksheet(&token, &title).await
    }
}

/// First row is the header; shorter rows are padded with empty strings.
pub fn rows_to_records(mut rows: Vec<Vec<Value>>) -> Vec<SheetRecord> {
    if rows.is_empty() {
        return Vec::new();
    }
    let headers: Vec<String> = rows
        .remove(0)
        .into_iter()
        .map(|h| match h {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect();

    rows.into_iter()
        .map(|row| {
            let mut cells = row.into_iter();
            headers
                .iter()
                .map(|header| {
                    let cell = cells.next().unwrap_or_else(|| Value::String(String::new()));
                    (header.clone(), cell)
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rows_to_records_pads_short_rows() {
        let rows = vec![
            vec![json!("Telefono"), json!("Nombre"), json!("Ingreso_Bruto")],
            vec![json!(56911112222_i64), json!("Ana"), json!(900)],
            vec![json!("56933334444")],
        ];

        let records = rows_to_records(rows);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["Nombre"], json!("Ana"));
        assert_eq!(records[1]["Nombre"], json!(""));
        assert_eq!(records[1]["Ingreso_Bruto"], json!(""));
    }

    #[test]
    fn test_rows_to_records_empty_sheet() {
        assert!(rows_to_records(Vec::new()).is_empty());
        assert!(rows_to_records(vec![vec![json!("Telefono")]]).is_empty());
    }

    #[test]
    fn test_spreadsheet_url_encodes_range() {
        let client = GoogleSheetsClient::with_static_token(
            "https://sheets.example.com/".to_string(),
            "abc123".to_string(),
            "token".to_string(),
        )
        .unwrap();
        let url = client
            .spreadsheet_url(&["values", "'Hoja 1'"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://sheets.example.com/v4/spreadsheets/abc123/values/'Hoja%201'"
        );
    }
}

//! Spreadsheet sync: imports leads from the first worksheet of the configured
//! spreadsheet using the create-if-absent path. Existing leads are never
//! modified by a sync.

use crate::errors::{AppError, ResultExt};
use crate::reconcile;
use crate::sheets_client::{SheetRecord, SheetSource};
use crate::store::LeadStore;
use crate::webhook_models::{
    count_from_value, decimal_from_value, flag_from_value, text_from_value, LeadPayload,
};
use serde::Serialize;
use serde_json::Value;

/// Spreadsheet row of the first data record (row 1 is the header).
const FIRST_DATA_ROW: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum RowOutcome {
    Created,
    Existing,
    Skipped { reason: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct RowResult {
    pub row: usize,
    pub telefono: Option<String>,
    #[serde(flatten)]
    pub outcome: RowOutcome,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub created: usize,
    pub existing: usize,
    pub skipped: usize,
    pub failed: usize,
    pub rows: Vec<RowResult>,
}

impl SyncReport {
    /// Rows that ended up as a stored lead, new or already known.
    pub fn processed(&self) -> usize {
        self.created + self.existing
    }

    fn record(&mut self, row: usize, telefono: Option<String>, outcome: RowOutcome) {
        match outcome {
            RowOutcome::Created => self.created += 1,
            RowOutcome::Existing => self.existing += 1,
            RowOutcome::Skipped { .. } => self.skipped += 1,
            RowOutcome::Failed { .. } => self.failed += 1,
        }
        self.rows.push(RowResult {
            row,
            telefono,
            outcome,
        });
    }
}

/// Maps one record to a validated payload. `None` when the phone cell is blank.
pub fn payload_from_record(record: &SheetRecord) -> Result<Option<LeadPayload>, AppError> {
    let telefono = text_cell(record, "Telefono")?;
    if telefono.as_deref().map(str::trim).unwrap_or("").is_empty() {
        return Ok(None);
    }

    let payload = LeadPayload {
        telefono,
        nombre: text_cell(record, "Nombre")?,
        email: text_cell(record, "Email")?,
        ingreso_bruto: cell(record, "Ingreso_Bruto", decimal_from_value)?,
        hipoteca_vigente: Some(mortgage_flag(record.get("Hipoteca_Vigente"))),
        segmento_laboral: text_cell(record, "Segmento_Laboral")?,
        estado_lead: text_cell(record, "Estado_Lead")?,
        numero_interacciones: cell(record, "Numero_Interacciones", count_from_value)?,
        ..LeadPayload::default()
    };

    payload.validate().map(Some)
}

/// Runs every record through the create-if-absent path; one bad row never aborts the batch.
pub async fn sync_records(store: &dyn LeadStore, records: Vec<SheetRecord>) -> SyncReport {
    let mut report = SyncReport::default();

    for (offset, record) in records.iter().enumerate() {
        let row = FIRST_DATA_ROW + offset;

        let payload = match payload_from_record(record) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                tracing::debug!("Row {}: empty Telefono, skipped", row);
                report.record(
                    row,
                    None,
                    RowOutcome::Skipped {
                        reason: "empty Telefono".to_string(),
                    },
                );
                continue;
            }
            Err(e) => {
                tracing::warn!("Row {}: invalid data: {}", row, e);
                report.record(
                    row,
                    raw_phone(record),
                    RowOutcome::Failed {
                        error: e.to_string(),
                    },
                );
                continue;
            }
        };

        let telefono = payload.phone_key().to_string();
        match reconcile::find_or_create(store, &payload).await {
            Ok(outcome) if outcome.created => {
                report.record(row, Some(telefono), RowOutcome::Created)
            }
            Ok(_) => report.record(row, Some(telefono), RowOutcome::Existing),
            Err(e) => {
                tracing::error!("Row {}: failed to store lead {}: {}", row, telefono, e);
                report.record(
                    row,
                    Some(telefono),
                    RowOutcome::Failed {
                        error: e.to_string(),
                    },
                );
            }
        }
    }

    report
}

/// Fetches the worksheet and imports it.
pub async fn sync_from_spreadsheet(
    store: &dyn LeadStore,
    source: &dyn SheetSource,
) -> Result<SyncReport, AppError> {
    let records = source
        .fetch_records()
        .await
        .context("Failed to read spreadsheet")?;
    tracing::info!("🔄 Syncing {} spreadsheet row(s)", records.len());

    let report = sync_records(store, records).await;
    tracing::info!(
        "✓ Sync finished: {} created, {} existing, {} skipped, {} failed",
        report.created,
        report.existing,
        report.skipped,
        report.failed
    );
    Ok(report)
}

fn cell<T>(
    record: &SheetRecord,
    column: &str,
    convert: fn(&Value) -> Result<Option<T>, String>,
) -> Result<Option<T>, AppError> {
    match record.get(column) {
        None => Ok(None),
        Some(value) => convert(value)
            .map_err(|e| AppError::BadRequest(format!("column {}: {}", column, e))),
    }
}

fn text_cell(record: &SheetRecord, column: &str) -> Result<Option<String>, AppError> {
    Ok(cell(record, column, text_from_value)?.filter(|s| !s.trim().is_empty()))
}

/// Unrecognized cell text counts as "no".
fn mortgage_flag(value: Option<&Value>) -> bool {
    value
        .and_then(|v| flag_from_value(v).ok().flatten())
        .unwrap_or(false)
}

fn raw_phone(record: &SheetRecord) -> Option<String> {
    record
        .get("Telefono")
        .and_then(|v| text_from_value(v).ok().flatten())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FunnelState;
    use crate::store::MemoryLeadStore;
    use bigdecimal::BigDecimal;
    use serde_json::json;

    fn record(value: Value) -> SheetRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("test record must be an object"),
        }
    }

    #[test]
    fn test_payload_from_record_maps_columns() {
        let payload = payload_from_record(&record(json!({
            "Telefono": 56911112222_i64,
            "Nombre": "Ana",
            "Email": "",
            "Ingreso_Bruto": 950.5,
            "Hipoteca_Vigente": "si",
            "Segmento_Laboral": "DEPENDIENTE",
            "Estado_Lead": "RECOMENDACION_HECHA",
            "Numero_Interacciones": "4"
        })))
        .unwrap()
        .unwrap();

        assert_eq!(payload.telefono.as_deref(), Some("56911112222"));
        assert_eq!(payload.nombre.as_deref(), Some("Ana"));
        assert_eq!(payload.email, None);
        assert_eq!(payload.ingreso_bruto, Some("950.5".parse::<BigDecimal>().unwrap()));
        assert_eq!(payload.hipoteca_vigente, Some(true));
        assert_eq!(payload.numero_interacciones, Some(4));
    }

    #[test]
    fn test_mortgage_flag_variants() {
        assert!(mortgage_flag(Some(&json!("SI"))));
        assert!(mortgage_flag(Some(&json!(" Si "))));
        assert!(mortgage_flag(Some(&json!(true))));
        assert!(!mortgage_flag(Some(&json!("NO"))));
        assert!(!mortgage_flag(Some(&json!(""))));
        assert!(!mortgage_flag(Some(&json!("quizás"))));
        assert!(mortgage_flag(Some(&json!(1))));
        assert!(!mortgage_flag(None));
    }

    #[test]
    fn test_payload_from_record_blank_phone() {
        let rec = record(json!({"Telefono": "  ", "Nombre": "Sin teléfono"}));
        assert!(payload_from_record(&rec).unwrap().is_none());
        assert!(payload_from_record(&record(json!({"Nombre": "x"}))).unwrap().is_none());
    }

    #[test]
    fn test_payload_from_record_rejects_bad_cells() {
        let rec = record(json!({"Telefono": "555", "Ingreso_Bruto": "mucho"}));
        assert!(matches!(
            payload_from_record(&rec),
            Err(AppError::BadRequest(_))
        ));

        let rec = record(json!({"Telefono": "555", "Numero_Interacciones": -2}));
        assert!(payload_from_record(&rec).is_err());
    }

    #[tokio::test]
    async fn test_sync_records_reports_each_row() {
        let store = MemoryLeadStore::new();
        let records = vec![
            record(json!({"Telefono": "111", "Nombre": "Ana"})),
            record(json!({"Telefono": "", "Nombre": "Nadie"})),
            record(json!({"Telefono": "111", "Nombre": "Ana Duplicada"})),
            record(json!({"Telefono": "222", "Ingreso_Bruto": "??"})),
            record(json!({"Telefono": "333", "Estado_Lead": ""})),
        ];

        let report = sync_records(&store, records).await;
        assert_eq!(report.created, 2);
        assert_eq!(report.existing, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.processed(), 3);
        assert_eq!(report.rows[1].row, 3);
        assert_eq!(report.rows[3].telefono.as_deref(), Some("222"));

        // create-only: the duplicate row does not rename the lead
        let ana = store.find_by_phone("111").await.unwrap().unwrap();
        assert_eq!(ana.nombre.as_deref(), Some("Ana"));

        let defaulted = store.find_by_phone("333").await.unwrap().unwrap();
        assert!(defaulted.is_in_state(FunnelState::ContactoInicial));
    }
}

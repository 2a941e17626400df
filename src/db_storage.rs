use crate::errors::{AppError, ResultExt};
use crate::models::{DailyMetric, Lead, LeadRow};
use crate::store::LeadStore;
use async_trait::async_trait;
use sqlx::PgPool;

const LEAD_COLUMNS: &str = r#"
    id, nombre, telefono, email, ingreso_bruto, hipoteca_vigente, segmento_laboral,
    estado_lead, tipo_lead, numero_interacciones, fecha_hilo, fecha_ultima_interaccion,
    banco_recomendado, monto_recomendado, created_at, updated_at
"#;

/// PostgreSQL-backed lead store (`carlos_chats`, `metricas_diarias`).
pub struct PgLeadStore {
    pool: PgPool,
}

impl PgLeadStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LeadStore for PgLeadStore {
    /// Insert-or-ignore on the unique phone index, then read back.
    ///
    /// Two sequential statements: the follow-up SELECT gets a fresh snapshot and
    /// therefore sees a row committed by a concurrent insert that won the race.
    async fn find_or_create(&self, candidate: Lead) -> Result<(Lead, bool), AppError> {
        let inserted = sqlx::query_as::<_, LeadRow>(&format!(
            r#"
            INSERT INTO carlos_chats ({LEAD_COLUMNS})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            ON CONFLICT (telefono) DO NOTHING
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(candidate.id)
        .bind(&candidate.nombre)
        .bind(&candidate.telefono)
        .bind(&candidate.email)
        .bind(&candidate.ingreso_bruto)
        .bind(candidate.hipoteca_vigente)
        .bind(&candidate.segmento_laboral)
        .bind(&candidate.estado_lead)
        .bind(candidate.tipo_lead.as_str())
        .bind(candidate.numero_interacciones)
        .bind(candidate.fecha_hilo)
        .bind(candidate.fecha_ultima_interaccion)
        .bind(&candidate.banco_recomendado)
        .bind(&candidate.monto_recomendado)
        .bind(candidate.created_at)
        .bind(candidate.updated_at)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to insert lead")?;

        if let Some(row) = inserted {
            tracing::debug!("Created lead {} for telefono={}", row.id, row.telefono);
            return Ok((row.into(), true));
        }

        let existing = self
            .find_by_phone(&candidate.telefono)
            .await?
            .ok_or_else(|| {
                AppError::InternalError(format!(
                    "Lead for telefono={} vanished after insert conflict",
                    candidate.telefono
                ))
            })?;

        Ok((existing, false))
    }

    async fn save(&self, lead: &Lead) -> Result<Lead, AppError> {
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            r#"
            UPDATE carlos_chats
            SET nombre = $2,
                email = $3,
                ingreso_bruto = $4,
                hipoteca_vigente = $5,
                segmento_laboral = $6,
                estado_lead = $7,
                tipo_lead = $8,
                numero_interacciones = $9,
                fecha_hilo = $10,
                fecha_ultima_interaccion = $11,
                banco_recomendado = $12,
                monto_recomendado = $13,
                updated_at = $14
            WHERE id = $1
            RETURNING {LEAD_COLUMNS}
            "#
        ))
        .bind(lead.id)
        .bind(&lead.nombre)
        .bind(&lead.email)
        .bind(&lead.ingreso_bruto)
        .bind(lead.hipoteca_vigente)
        .bind(&lead.segmento_laboral)
        .bind(&lead.estado_lead)
        .bind(lead.tipo_lead.as_str())
        .bind(lead.numero_interacciones)
        .bind(lead.fecha_hilo)
        .bind(lead.fecha_ultima_interaccion)
        .bind(&lead.banco_recomendado)
        .bind(&lead.monto_recomendado)
        .bind(lead.updated_at)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to update lead")?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", lead.id)))?;

        Ok(row.into())
    }

    async fn find_by_phone(&self, telefono: &str) -> Result<Option<Lead>, AppError> {
        let row = sqlx::query_as::<_, LeadRow>(&format!(
            "SELECT {LEAD_COLUMNS} FROM carlos_chats WHERE telefono = $1 LIMIT 1"
        ))
        .bind(telefono)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Lead::from))
    }

    async fn list_leads(&self) -> Result<Vec<Lead>, AppError> {
        let rows = sqlx::query_as::<_, LeadRow>(&format!(
            "SELECT {LEAD_COLUMNS} FROM carlos_chats ORDER BY fecha_ultima_interaccion DESC NULLS LAST"
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list leads")?;

        Ok(rows.into_iter().map(Lead::from).collect())
    }

    async fn upsert_daily_metric(&self, metric: &DailyMetric) -> Result<DailyMetric, AppError> {
        let stored = sqlx::query_as::<_, DailyMetric>(
            r#"
            INSERT INTO metricas_diarias (
                fecha, total_conversaciones, conversaciones_completadas, tiempo_promedio,
                tasa_conversion, leads_frios, leads_tibios, leads_calientes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (fecha) DO UPDATE
            SET total_conversaciones = EXCLUDED.total_conversaciones,
                conversaciones_completadas = EXCLUDED.conversaciones_completadas,
                tiempo_promedio = EXCLUDED.tiempo_promedio,
                tasa_conversion = EXCLUDED.tasa_conversion,
                leads_frios = EXCLUDED.leads_frios,
                leads_tibios = EXCLUDED.leads_tibios,
                leads_calientes = EXCLUDED.leads_calientes,
                updated_at = now()
            RETURNING *
            "#,
        )
        .bind(metric.fecha)
        .bind(metric.total_conversaciones)
        .bind(metric.conversaciones_completadas)
        .bind(metric.tiempo_promedio)
        .bind(metric.tasa_conversion)
        .bind(metric.leads_frios)
        .bind(metric.leads_tibios)
        .bind(metric.leads_calientes)
        .bind(metric.created_at)
        .bind(metric.updated_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert daily metric")?;

        Ok(stored)
    }

    async fn list_daily_metrics(&self, limit: usize) -> Result<Vec<DailyMetric>, AppError> {
        let metrics = sqlx::query_as::<_, DailyMetric>(
            "SELECT * FROM metricas_diarias ORDER BY fecha DESC LIMIT $1",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        Ok(metrics)
    }
}

use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============ Funnel & Temperature ============

/// Ordered stages a conversation moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunnelState {
    ContactoInicial,
    RecopilandoPersonal,
    RecopilandoFinanciera,
    RecomendacionHecha,
    AceptaDerivacion,
    ManejaObjeciones,
    Finalizado,
}

impl FunnelState {
    /// Funnel vocabulary in display order.
    pub const ALL: [FunnelState; 7] = [
        FunnelState::ContactoInicial,
        FunnelState::RecopilandoPersonal,
        FunnelState::RecopilandoFinanciera,
        FunnelState::RecomendacionHecha,
        FunnelState::AceptaDerivacion,
        FunnelState::ManejaObjeciones,
        FunnelState::Finalizado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FunnelState::ContactoInicial => "CONTACTO_INICIAL",
            FunnelState::RecopilandoPersonal => "RECOPILANDO_PERSONAL",
            FunnelState::RecopilandoFinanciera => "RECOPILANDO_FINANCIERA",
            FunnelState::RecomendacionHecha => "RECOMENDACION_HECHA",
            FunnelState::AceptaDerivacion => "ACEPTA_DERIVACION",
            FunnelState::ManejaObjeciones => "MANEJA_OBJECIONES",
            FunnelState::Finalizado => "FINALIZADO",
        }
    }
}

impl fmt::Display for FunnelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lead temperature (cold / warm / hot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LeadTemperature {
    #[default]
    Frio,
    Tibio,
    Caliente,
}

impl LeadTemperature {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadTemperature::Frio => "FRIO",
            LeadTemperature::Tibio => "TIBIO",
            LeadTemperature::Caliente => "CALIENTE",
        }
    }
}

impl FromStr for LeadTemperature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FRIO" => Ok(LeadTemperature::Frio),
            "TIBIO" => Ok(LeadTemperature::Tibio),
            "CALIENTE" => Ok(LeadTemperature::Caliente),
            other => Err(format!("Unknown lead temperature '{}'", other)),
        }
    }
}

// ============ Database Models ============

/// One conversation thread with a prospective customer, keyed by phone number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub nombre: Option<String>,
    pub telefono: String,
    pub email: Option<String>,
    pub ingreso_bruto: Option<BigDecimal>,
    pub hipoteca_vigente: bool,
    pub segmento_laboral: String,
    /// Usually one of [`FunnelState::ALL`], but any source-provided value is kept.
    pub estado_lead: String,
    pub tipo_lead: LeadTemperature,
    pub numero_interacciones: i32,
    pub fecha_hilo: Option<DateTime<Utc>>,
    pub fecha_ultima_interaccion: Option<DateTime<Utc>>,
    pub banco_recomendado: Option<String>,
    pub monto_recomendado: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Lead {
    /// Conversation duration in minutes, zero when either timestamp is missing.
    pub fn duracion_minutos(&self) -> f64 {
        match (self.fecha_hilo, self.fecha_ultima_interaccion) {
            (Some(start), Some(last)) => (last - start).num_milliseconds() as f64 / 60_000.0,
            _ => 0.0,
        }
    }

    pub fn has_both_timestamps(&self) -> bool {
        self.fecha_hilo.is_some() && self.fecha_ultima_interaccion.is_some()
    }

    pub fn is_in_state(&self, state: FunnelState) -> bool {
        self.estado_lead == state.as_str()
    }
}

/// Row shape of `carlos_chats`; `tipo_lead` is stored as text.
#[derive(Debug, Clone, FromRow)]
pub struct LeadRow {
    pub id: Uuid,
    pub nombre: Option<String>,
    pub telefono: String,
    pub email: Option<String>,
    pub ingreso_bruto: Option<BigDecimal>,
    pub hipoteca_vigente: bool,
    pub segmento_laboral: String,
    pub estado_lead: String,
    pub tipo_lead: String,
    pub numero_interacciones: i32,
    pub fecha_hilo: Option<DateTime<Utc>>,
    pub fecha_ultima_interaccion: Option<DateTime<Utc>>,
    pub banco_recomendado: Option<String>,
    pub monto_recomendado: Option<BigDecimal>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<LeadRow> for Lead {
    fn from(row: LeadRow) -> Self {
        let tipo_lead = row.tipo_lead.parse().unwrap_or_else(|e| {
            tracing::warn!("Lead {} has {}, treating as FRIO", row.id, e);
            LeadTemperature::Frio
        });

        Lead {
            id: row.id,
            nombre: row.nombre,
            telefono: row.telefono,
            email: row.email,
            ingreso_bruto: row.ingreso_bruto,
            hipoteca_vigente: row.hipoteca_vigente,
            segmento_laboral: row.segmento_laboral,
            estado_lead: row.estado_lead,
            tipo_lead,
            numero_interacciones: row.numero_interacciones,
            fecha_hilo: row.fecha_hilo,
            fecha_ultima_interaccion: row.fecha_ultima_interaccion,
            banco_recomendado: row.banco_recomendado,
            monto_recomendado: row.monto_recomendado,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Aggregated snapshot for one calendar date.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct DailyMetric {
    pub fecha: NaiveDate,
    pub total_conversaciones: i32,
    pub conversaciones_completadas: i32,
    pub tiempo_promedio: f64,
    pub tasa_conversion: f64,
    pub leads_frios: i32,
    pub leads_tibios: i32,
    pub leads_calientes: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============ API Response Models ============

/// Labels/data pair consumed directly by the dashboard charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub data: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MortgageSplit {
    pub con_hipoteca: i64,
    pub sin_hipoteca: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelStage {
    pub estado: String,
    pub cantidad: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunnelResponse {
    pub embudo: Vec<FunnelStage>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub total_conversaciones: i64,
    pub tiempo_promedio: f64,
    pub interacciones_promedio: f64,
    pub eficiencia: f64,
}

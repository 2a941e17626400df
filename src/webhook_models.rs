use crate::errors::AppError;
use crate::models::LeadTemperature;
use bigdecimal::{BigDecimal, RoundingMode, Zero};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::str::FromStr;

// Column limits of the carlos_chats table
const MAX_NOMBRE: usize = 100;
const MAX_TELEFONO: usize = 20;
const MAX_EMAIL: usize = 254;
const MAX_SEGMENTO: usize = 50;
const MAX_ESTADO: usize = 50;
const MAX_BANCO: usize = 100;

// NUMERIC(12, 2): two decimals, ten integer digits
const MONEY_SCALE: i64 = 2;
const MONEY_LIMIT: i64 = 10_000_000_000;

/// Inbound lead data, as sent by the Make automation or built from a spreadsheet row.
///
/// Every field is optional; absent fields get the defaults applied by reconciliation.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct LeadPayload {
    #[serde(default, deserialize_with = "lenient_string")]
    pub telefono: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub nombre: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub ingreso_bruto: Option<BigDecimal>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub hipoteca_vigente: Option<bool>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub segmento_laboral: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub estado_lead: Option<String>,
    #[serde(default, deserialize_with = "lenient_count")]
    pub numero_interacciones: Option<i32>,
    #[serde(default)]
    pub tipo_lead: Option<LeadTemperature>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub banco_recomendado: Option<String>,
    #[serde(default, deserialize_with = "lenient_decimal")]
    pub monto_recomendado: Option<BigDecimal>,
}

impl LeadPayload {
    /// Parses a raw request body, mapping any JSON or type error to `BadRequest`.
    pub fn from_json_bytes(body: &[u8]) -> Result<Self, AppError> {
        let payload: LeadPayload = serde_json::from_slice(body)
            .map_err(|e| AppError::BadRequest(format!("Invalid JSON payload: {}", e)))?;
        payload.validate()
    }

    /// Phone number used as the upsert key; missing is treated as empty.
    pub fn phone_key(&self) -> &str {
        self.telefono.as_deref().map(str::trim).unwrap_or("")
    }

    /// Boundary validation: column length limits, non-negative counts, and
    /// money amounts that fit the stored precision (rounded to cents).
    pub fn validate(mut self) -> Result<Self, AppError> {
        check_len("telefono", self.telefono.as_deref().map(str::trim), MAX_TELEFONO)?;
        check_len("nombre", self.nombre.as_deref(), MAX_NOMBRE)?;
        check_len("email", self.email.as_deref(), MAX_EMAIL)?;
        check_len("segmento_laboral", self.segmento_laboral.as_deref(), MAX_SEGMENTO)?;
        check_len("estado_lead", self.estado_lead.as_deref(), MAX_ESTADO)?;
        check_len("banco_recomendado", self.banco_recomendado.as_deref(), MAX_BANCO)?;

        self.ingreso_bruto = self
            .ingreso_bruto
            .map(|v| check_money("ingreso_bruto", v))
            .transpose()?;
        self.monto_recomendado = self
            .monto_recomendado
            .map(|v| check_money("monto_recomendado", v))
            .transpose()?;
        if let Some(n) = self.numero_interacciones {
            if n < 0 {
                return Err(AppError::BadRequest(
                    "numero_interacciones cannot be negative".to_string(),
                ));
            }
        }

        Ok(self)
    }
}

fn check_len(field: &str, value: Option<&str>, max: usize) -> Result<(), AppError> {
    match value {
        Some(v) if v.chars().count() > max => Err(AppError::BadRequest(format!(
            "{} exceeds {} characters",
            field, max
        ))),
        _ => Ok(()),
    }
}

fn check_money(field: &str, value: BigDecimal) -> Result<BigDecimal, AppError> {
    if value < BigDecimal::zero() {
        return Err(AppError::BadRequest(format!("{} cannot be negative", field)));
    }
    let rounded = value.with_scale_round(MONEY_SCALE, RoundingMode::HalfEven);
    if rounded >= BigDecimal::from(MONEY_LIMIT) {
        return Err(AppError::BadRequest(format!(
            "{} must be less than {}",
            field, MONEY_LIMIT
        )));
    }
    Ok(rounded)
}

/// Response sent back to the Make webhook
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookResponse {
    pub status: String,
    pub message: String,
    pub created: bool,
}

// ============ Lenient cell/field conversions ============
//
// Automation tools and spreadsheets send numbers as strings and vice versa.
// These helpers are shared by the webhook deserializer and the sheet row mapper.

/// Text value: strings as-is, numbers rendered without a trailing `.0`.
pub fn text_from_value(value: &Value) -> Result<Option<String>, String> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Number(n) => Ok(Some(match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => i.to_string(),
            (None, Some(f)) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        })),
        Value::Bool(b) => Ok(Some(b.to_string())),
        other => Err(format!("expected text, found {}", other)),
    }
}

/// Decimal value: JSON number or numeric string; null and blank mean absent.
pub fn decimal_from_value(value: &Value) -> Result<Option<BigDecimal>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => BigDecimal::from_str(&n.to_string())
            .map(Some)
            .map_err(|e| format!("invalid decimal {}: {}", n, e)),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => BigDecimal::from_str(s.trim())
            .map(Some)
            .map_err(|_| format!("invalid decimal '{}'", s)),
        other => Err(format!("expected a number, found {}", other)),
    }
}

/// Integer count: JSON integer or integer string; null and blank mean absent.
pub fn count_from_value(value: &Value) -> Result<Option<i32>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => {
            let parsed = match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => Some(i),
                (None, Some(f)) if f.fract() == 0.0 => Some(f as i64),
                _ => None,
            };
            parsed
                .and_then(|i| i32::try_from(i).ok())
                .map(Some)
                .ok_or_else(|| format!("invalid integer {}", n))
        }
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => s
            .trim()
            .parse::<i32>()
            .map(Some)
            .map_err(|_| format!("invalid integer '{}'", s)),
        other => Err(format!("expected an integer, found {}", other)),
    }
}

/// Yes/no flag: booleans, `1`/`0`, and `true`/`false`/`si`/`no` in any case.
pub fn flag_from_value(value: &Value) -> Result<Option<bool>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(1) => Ok(Some(true)),
            Some(0) => Ok(Some(false)),
            _ => Err(format!("invalid flag {}", n)),
        },
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "" => Ok(None),
            "true" | "1" | "si" | "sí" => Ok(Some(true)),
            "false" | "0" | "no" => Ok(Some(false)),
            _ => Err(format!("invalid flag '{}'", s)),
        },
        other => Err(format!("expected a flag, found {}", other)),
    }
}

fn lenient_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    flag_from_value(&value).map_err(de::Error::custom)
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null | Value::String(_) | Value::Number(_) => {
            text_from_value(&value).map_err(de::Error::custom)
        }
        other => Err(de::Error::custom(format!("expected text, found {}", other))),
    }
}

fn lenient_decimal<'de, D>(deserializer: D) -> Result<Option<BigDecimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    decimal_from_value(&value).map_err(de::Error::custom)
}

fn lenient_count<'de, D>(deserializer: D) -> Result<Option<i32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    count_from_value(&value).map_err(de::Error::custom)
}

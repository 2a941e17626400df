//! Lead reconciliation: find-or-create by phone number and field-level merge.
//!
//! Merge precedence for an existing lead:
//! - `nombre`, `email`, `segmento_laboral`, `banco_recomendado`, `tipo_lead`:
//!   replaced only by a non-empty payload value.
//! - `ingreso_bruto`, `monto_recomendado`: replaced only by a non-zero value.
//! - `hipoteca_vigente`, `estado_lead`, `numero_interacciones`: always taken
//!   from the payload, falling back to the default when absent.

use crate::errors::AppError;
use crate::models::{FunnelState, Lead};
use crate::store::LeadStore;
use crate::webhook_models::LeadPayload;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Outcome of a reconciliation call.
#[derive(Debug, Clone)]
pub struct Reconciled {
    pub lead: Lead,
    pub created: bool,
}

/// Create-or-merge path used by the webhook.
pub async fn reconcile(store: &dyn LeadStore, payload: &LeadPayload) -> Result<Reconciled, AppError> {
    let now = Utc::now();
    let (mut lead, created) = store.find_or_create(new_lead(payload, now)).await?;

    if !created {
        merge_into(&mut lead, payload, now);
        lead = store.save(&lead).await?;
        tracing::debug!("Merged webhook data into lead {} (telefono={})", lead.id, lead.telefono);
    } else {
        tracing::info!("Created lead {} (telefono={})", lead.id, lead.telefono);
    }

    Ok(Reconciled { lead, created })
}

/// Create-if-absent path used by the spreadsheet sync; existing leads are untouched.
pub async fn find_or_create(
    store: &dyn LeadStore,
    payload: &LeadPayload,
) -> Result<Reconciled, AppError> {
    let (lead, created) = store.find_or_create(new_lead(payload, Utc::now())).await?;
    Ok(Reconciled { lead, created })
}

/// Builds a brand-new lead from the payload with defaults for absent fields.
pub fn new_lead(payload: &LeadPayload, now: DateTime<Utc>) -> Lead {
    Lead {
        id: Uuid::new_v4(),
        nombre: non_empty(&payload.nombre),
        telefono: payload.phone_key().to_string(),
        email: non_empty(&payload.email),
        ingreso_bruto: payload.ingreso_bruto.clone(),
        hipoteca_vigente: payload.hipoteca_vigente.unwrap_or(false),
        segmento_laboral: non_empty(&payload.segmento_laboral).unwrap_or_default(),
        estado_lead: estado_or_default(payload),
        tipo_lead: payload.tipo_lead.unwrap_or_default(),
        numero_interacciones: payload.numero_interacciones.unwrap_or(0),
        fecha_hilo: Some(now),
        fecha_ultima_interaccion: Some(now),
        banco_recomendado: non_empty(&payload.banco_recomendado),
        monto_recomendado: payload.monto_recomendado.clone(),
        created_at: now,
        updated_at: now,
    }
}

/// Applies the merge precedence rules to an existing lead.
pub fn merge_into(lead: &mut Lead, payload: &LeadPayload, now: DateTime<Utc>) {
    if let Some(nombre) = non_empty(&payload.nombre) {
        lead.nombre = Some(nombre);
    }
    if let Some(email) = non_empty(&payload.email) {
        lead.email = Some(email);
    }
    if let Some(segmento) = non_empty(&payload.segmento_laboral) {
        lead.segmento_laboral = segmento;
    }
    if let Some(ingreso) = truthy(&payload.ingreso_bruto) {
        lead.ingreso_bruto = Some(ingreso);
    }

    // Authoritative state from the source system
    lead.hipoteca_vigente = payload.hipoteca_vigente.unwrap_or(false);
    lead.estado_lead = estado_or_default(payload);
    lead.numero_interacciones = payload.numero_interacciones.unwrap_or(0);

    if let Some(tipo) = payload.tipo_lead {
        lead.tipo_lead = tipo;
    }
    if let Some(banco) = non_empty(&payload.banco_recomendado) {
        lead.banco_recomendado = Some(banco);
    }
    if let Some(monto) = truthy(&payload.monto_recomendado) {
        lead.monto_recomendado = Some(monto);
    }

    lead.fecha_ultima_interaccion = Some(now);
    lead.updated_at = now;
}

fn estado_or_default(payload: &LeadPayload) -> String {
    non_empty(&payload.estado_lead)
        .unwrap_or_else(|| FunnelState::ContactoInicial.as_str().to_string())
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn truthy(value: &Option<BigDecimal>) -> Option<BigDecimal> {
    value.as_ref().filter(|v| !v.is_zero()).cloned()
}

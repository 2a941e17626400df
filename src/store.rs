//! Record store abstraction for leads and daily metrics.
//!
//! `find_or_create` is the only way a lead comes into existence and must be
//! atomic per phone number, so two concurrent events for an unseen phone can
//! never produce two records.

use crate::errors::AppError;
use crate::models::{DailyMetric, Lead};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Returns the lead stored under `candidate.telefono`, inserting `candidate`
    /// if there is none. The flag is `true` when `candidate` was inserted.
    async fn find_or_create(&self, candidate: Lead) -> Result<(Lead, bool), AppError>;

    /// Persists every mutable field of an existing lead.
    async fn save(&self, lead: &Lead) -> Result<Lead, AppError>;

    async fn find_by_phone(&self, telefono: &str) -> Result<Option<Lead>, AppError>;

    /// Snapshot of all leads, most recent interaction first.
    async fn list_leads(&self) -> Result<Vec<Lead>, AppError>;

    async fn upsert_daily_metric(&self, metric: &DailyMetric) -> Result<DailyMetric, AppError>;

    /// Stored daily metrics, newest date first.
    async fn list_daily_metrics(&self, limit: usize) -> Result<Vec<DailyMetric>, AppError>;
}

/// In-process store used by tests and by deployments without `DATABASE_URL`.
#[derive(Default)]
pub struct MemoryLeadStore {
    leads: RwLock<Vec<Lead>>,
    daily_metrics: RwLock<BTreeMap<NaiveDate, DailyMetric>>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn find_or_create(&self, candidate: Lead) -> Result<(Lead, bool), AppError> {
        // Lookup and insert happen under the same write guard
        let mut leads = self.leads.write().await;
        if let Some(existing) = leads.iter().find(|l| l.telefono == candidate.telefono) {
            return Ok((existing.clone(), false));
        }
        leads.push(candidate.clone());
        Ok((candidate, true))
    }

    async fn save(&self, lead: &Lead) -> Result<Lead, AppError> {
        let mut leads = self.leads.write().await;
        let slot = leads
            .iter_mut()
            .find(|l| l.id == lead.id)
            .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", lead.id)))?;
        *slot = lead.clone();
        Ok(lead.clone())
    }

    async fn find_by_phone(&self, telefono: &str) -> Result<Option<Lead>, AppError> {
        let leads = self.leads.read().await;
        Ok(leads.iter().find(|l| l.telefono == telefono).cloned())
    }

    async fn list_leads(&self) -> Result<Vec<Lead>, AppError> {
        let mut leads = self.leads.read().await.clone();
        leads.sort_by(|a, b| b.fecha_ultima_interaccion.cmp(&a.fecha_ultima_interaccion));
        Ok(leads)
    }

    async fn upsert_daily_metric(&self, metric: &DailyMetric) -> Result<DailyMetric, AppError> {
        let mut metrics = self.daily_metrics.write().await;
        let stored = match metrics.get(&metric.fecha) {
            Some(previous) => DailyMetric {
                created_at: previous.created_at,
                updated_at: Utc::now(),
                ..metric.clone()
            },
            None => metric.clone(),
        };
        metrics.insert(stored.fecha, stored.clone());
        Ok(stored)
    }

    async fn list_daily_metrics(&self, limit: usize) -> Result<Vec<DailyMetric>, AppError> {
        let metrics = self.daily_metrics.read().await;
        Ok(metrics.values().rev().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LeadTemperature;
    use uuid::Uuid;

    fn lead(telefono: &str) -> Lead {
        let now = Utc::now();
        Lead {
            id: Uuid::new_v4(),
            nombre: None,
            telefono: telefono.to_string(),
            email: None,
            ingreso_bruto: None,
            hipoteca_vigente: false,
            segmento_laboral: String::new(),
            estado_lead: "CONTACTO_INICIAL".to_string(),
            tipo_lead: LeadTemperature::Frio,
            numero_interacciones: 0,
            fecha_hilo: Some(now),
            fecha_ultima_interaccion: Some(now),
            banco_recomendado: None,
            monto_recomendado: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_find_or_create_returns_existing() {
        let store = MemoryLeadStore::new();
        let (first, created) = store.find_or_create(lead("555")).await.unwrap();
        assert!(created);

        let (second, created) = store.find_or_create(lead("555")).await.unwrap();
        assert!(!created);
        assert_eq!(first.id, second.id);
        assert_eq!(store.list_leads().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_save_unknown_lead_is_not_found() {
        let store = MemoryLeadStore::new();
        let err = store.save(&lead("777")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_daily_metric_upsert_keeps_created_at() {
        let store = MemoryLeadStore::new();
        let fecha = NaiveDate::from_ymd_opt(2026, 10, 1).unwrap();
        let created = Utc::now() - chrono::Duration::hours(2);
        let metric = DailyMetric {
            fecha,
            total_conversaciones: 1,
            conversaciones_completadas: 0,
            tiempo_promedio: 0.0,
            tasa_conversion: 0.0,
            leads_frios: 1,
            leads_tibios: 0,
            leads_calientes: 0,
            created_at: created,
            updated_at: created,
        };
        store.upsert_daily_metric(&metric).await.unwrap();

        let refreshed = DailyMetric {
            total_conversaciones: 3,
            created_at: Utc::now(),
            ..metric.clone()
        };
        let stored = store.upsert_daily_metric(&refreshed).await.unwrap();
        assert_eq!(stored.total_conversaciones, 3);
        assert_eq!(stored.created_at, created);
        assert_eq!(store.list_daily_metrics(10).await.unwrap().len(), 1);
    }
}

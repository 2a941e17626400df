use crate::config::Config;
use crate::db_storage::PgLeadStore;
use crate::store::{LeadStore, MemoryLeadStore};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::sync::Arc;

pub struct Database {
    pub pool: PgPool,
}

/// Tables are created if missing; there is no migration history.
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS carlos_chats (
        id UUID PRIMARY KEY,
        nombre VARCHAR(100),
        telefono VARCHAR(20) NOT NULL,
        email VARCHAR(254),
        ingreso_bruto NUMERIC(12, 2),
        hipoteca_vigente BOOLEAN NOT NULL DEFAULT FALSE,
        segmento_laboral VARCHAR(50) NOT NULL DEFAULT '',
        estado_lead VARCHAR(50) NOT NULL DEFAULT 'CONTACTO_INICIAL',
        tipo_lead VARCHAR(20) NOT NULL DEFAULT 'FRIO',
        numero_interacciones INTEGER NOT NULL DEFAULT 0 CHECK (numero_interacciones >= 0),
        fecha_hilo TIMESTAMPTZ,
        fecha_ultima_interaccion TIMESTAMPTZ,
        banco_recomendado VARCHAR(100),
        monto_recomendado NUMERIC(12, 2),
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS carlos_chats_telefono_key ON carlos_chats (telefono)",
    "CREATE INDEX IF NOT EXISTS carlos_chats_fecha_hilo_idx ON carlos_chats (fecha_hilo)",
    r#"
    CREATE TABLE IF NOT EXISTS metricas_diarias (
        fecha DATE PRIMARY KEY,
        total_conversaciones INTEGER NOT NULL DEFAULT 0,
        conversaciones_completadas INTEGER NOT NULL DEFAULT 0,
        tiempo_promedio DOUBLE PRECISION NOT NULL DEFAULT 0,
        tasa_conversion DOUBLE PRECISION NOT NULL DEFAULT 0,
        leads_frios INTEGER NOT NULL DEFAULT 0,
        leads_tibios INTEGER NOT NULL DEFAULT 0,
        leads_calientes INTEGER NOT NULL DEFAULT 0,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
        updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
];

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;

        Ok(Self { pool })
    }

    pub async fn ensure_schema(&self) -> anyhow::Result<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        tracing::info!("Database schema verified");
        Ok(())
    }
}

/// Opens the configured store: PostgreSQL when a URL is set, memory otherwise.
pub async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn LeadStore>> {
    match config.database_url {
        Some(ref url) => {
            let db = Database::new(url).await?;
            db.ensure_schema().await?;
            tracing::info!("Database connection pool established");
            Ok(Arc::new(PgLeadStore::new(db.pool)))
        }
        None => {
            tracing::warn!("Using in-memory lead store, data is lost on restart");
            Ok(Arc::new(MemoryLeadStore::new()))
        }
    }
}

//! services/status_service.rs
//! Estado de entrega por (campaign_id, receiver). Fuente de verdad durable.

use std::str::FromStr;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

use crate::models::blast_model::{BlastStatusRecord, CampaignSummary, DeliveryStatus};

/// Contrato mínimo que necesita el procesador de campañas.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// `None` si no existe fila para ese destinatario.
    async fn read(&self, campaign_id: &str, receiver: &str) -> Result<Option<DeliveryStatus>>;

    async fn write(&self, campaign_id: &str, receiver: &str, status: DeliveryStatus)
        -> Result<()>;
}

#[derive(Clone, Debug)]
pub struct SqliteStatusStore {
    db_pool: Pool<Sqlite>,
}

impl SqliteStatusStore {
    pub fn new(db_pool: Pool<Sqlite>) -> Self {
        SqliteStatusStore { db_pool }
    }

    /// Corre migraciones con sqlx
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db_pool)
            .await
            .context("Failed to run blasts migrations")?;
        Ok(())
    }

    /// Registra destinatarios como 'pending'. Si la fila ya existe no se toca,
    /// así un reenvío no revive entregas ya resueltas.
    pub async fn seed_pending<'a, I>(&self, campaign_id: &str, receivers: I) -> Result<u64>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let now = Utc::now().to_rfc3339();
        let mut tx = self
            .db_pool
            .begin()
            .await
            .context("No se pudo abrir transacción para registrar blasts")?;

        let mut inserted = 0;
        for receiver in receivers {
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO blasts (id, campaign_id, receiver, status, created_at, updated_at)
                VALUES (?1, ?2, ?3, 'pending', ?4, ?4)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(campaign_id)
            .bind(receiver)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .context("Error registrando blast pendiente")?;
            inserted += result.rows_affected();
        }

        tx.commit().await.context("Error confirmando blasts pendientes")?;
        Ok(inserted)
    }

    pub async fn list_campaign(&self, campaign_id: &str) -> Result<Vec<BlastStatusRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT receiver, status, updated_at
            FROM blasts
            WHERE campaign_id = ?1
            ORDER BY created_at ASC, receiver ASC
            "#,
        )
        .bind(campaign_id)
        .fetch_all(&self.db_pool)
        .await
        .context("Error listando blasts de la campaña")?;

        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let status: String = row.try_get("status")?;
            result.push(BlastStatusRecord {
                receiver: row.try_get("receiver")?,
                status: DeliveryStatus::from_str(&status)?,
                updated_at: row.try_get("updated_at")?,
            });
        }
        Ok(result)
    }

    pub async fn campaign_summary(&self, campaign_id: &str) -> Result<CampaignSummary> {
        let rows = sqlx::query(
            r#"SELECT status, COUNT(*) AS cnt FROM blasts WHERE campaign_id = ?1 GROUP BY status"#,
        )
        .bind(campaign_id)
        .fetch_all(&self.db_pool)
        .await
        .context("Error contando blasts de la campaña")?;

        let mut summary = CampaignSummary::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let count: i64 = row.try_get("cnt")?;
            let count = count.max(0) as u64;
            match DeliveryStatus::from_str(&status)? {
                DeliveryStatus::Pending => summary.pending = count,
                DeliveryStatus::Success => summary.success = count,
                DeliveryStatus::Failed => summary.failed = count,
            }
        }
        Ok(summary)
    }
}

#[async_trait]
impl StatusStore for SqliteStatusStore {
    async fn read(&self, campaign_id: &str, receiver: &str) -> Result<Option<DeliveryStatus>> {
        let row = sqlx::query(r#"SELECT status FROM blasts WHERE campaign_id = ?1 AND receiver = ?2"#)
            .bind(campaign_id)
            .bind(receiver)
            .fetch_optional(&self.db_pool)
            .await
            .context("Error leyendo estado del blast")?;

        match row {
            Some(row) => {
                let status: String = row.try_get("status")?;
                Ok(Some(DeliveryStatus::from_str(&status)?))
            }
            None => Ok(None),
        }
    }

    async fn write(
        &self,
        campaign_id: &str,
        receiver: &str,
        status: DeliveryStatus,
    ) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"
            UPDATE blasts
            SET status = ?1,
                updated_at = ?2
            WHERE campaign_id = ?3 AND receiver = ?4
            "#,
        )
        .bind(status.as_str())
        .bind(now)
        .bind(campaign_id)
        .bind(receiver)
        .execute(&self.db_pool)
        .await
        .context("Error actualizando estado del blast")?;

        Ok(())
    }
}

//! services/blast_service.rs
//! Procesador de campañas: recorre los ítems de un lote en orden, con pacing,
//! verificación de estado, existencia del destinatario, envío y reintento
//! ante rate-limit del proveedor.

use std::fmt;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::gateway_config::DispatchConfig;
use crate::errors::{DeliveryError, SubmissionError};
use crate::models::blast_model::{BlastItem, CampaignBatch, DeliveryStatus, SubmitAck};
use crate::services::delivery_service::{dispatch, format_receiver, DeliveryAdapter};
use crate::services::pacing_service::pace;
use crate::services::payload_service::normalize;
use crate::services::queue_service::{CampaignScheduler, CampaignTask};
use crate::services::status_service::StatusStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Posición `null` en el arreglo
    EmptySlot,
    /// Falta sender, receiver o message
    MissingFields,
    /// Ya resuelto (o sin fila) en el store
    NotPending,
    MalformedPayload,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailReason {
    ReceiverUnreachable,
    ExistenceCheckError,
    Rejected,
    SendError,
    RetriesExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    Success,
    Failed(FailReason),
    Skipped(SkipReason),
}

/// Resultado de un intento sobre un ítem.
enum Attempt {
    Settled(ItemOutcome),
    /// Rate-limit: no se escribe estado y se reprocesa el mismo índice
    Transient(DeliveryError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignReport {
    pub sent: usize,
    pub failed: usize,
    pub skipped: usize,
    pub transient_retries: usize,
}

impl CampaignReport {
    fn record(&mut self, outcome: ItemOutcome) {
        match outcome {
            ItemOutcome::Success => self.sent += 1,
            ItemOutcome::Failed(_) => self.failed += 1,
            ItemOutcome::Skipped(_) => self.skipped += 1,
        }
    }
}

impl fmt::Display for CampaignReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "sent={} failed={} skipped={} transient_retries={}",
            self.sent, self.failed, self.skipped, self.transient_retries
        )
    }
}

#[derive(Clone)]
pub struct CampaignProcessor {
    store: Arc<dyn StatusStore>,
    adapter: Arc<dyn DeliveryAdapter>,
    config: DispatchConfig,
}

impl CampaignProcessor {
    pub fn new(
        store: Arc<dyn StatusStore>,
        adapter: Arc<dyn DeliveryAdapter>,
        config: DispatchConfig,
    ) -> Self {
        Self {
            store,
            adapter,
            config,
        }
    }

    /// Procesa el lote completo. Sólo deja rastro en el store de estados; los
    /// errores del store abortan la corrida (sin store no hay guarda anti-duplicados).
    pub async fn run(&self, batch: &CampaignBatch) -> Result<CampaignReport> {
        log::info!(
            "(run) Iniciando campaña {} con {} ítems (pacing {}-{} ms).",
            batch.campaign_id,
            batch.items.len(),
            batch.pacing.min_delay_ms(),
            batch.pacing.max_delay_ms()
        );

        let mut report = CampaignReport::default();
        let mut index = 0;
        let mut transient_attempts: u32 = 0;

        while index < batch.items.len() {
            pace(&batch.pacing).await;

            let outcome = match self.attempt(batch, batch.items[index].as_ref()).await? {
                Attempt::Settled(outcome) => outcome,
                Attempt::Transient(err) => {
                    transient_attempts += 1;
                    report.transient_retries += 1;

                    if transient_attempts < self.config.max_send_attempts {
                        log::warn!(
                            "(run) Campaña {} ítem {}: {} (intento {}/{}). Reintentando en {} ms.",
                            batch.campaign_id,
                            index,
                            err,
                            transient_attempts,
                            self.config.max_send_attempts,
                            self.config.transient_backoff_ms
                        );
                        tokio::time::sleep(self.config.transient_backoff()).await;
                        continue;
                    }

                    log::error!(
                        "(run) Campaña {} ítem {}: agotados {} intentos por rate-limit.",
                        batch.campaign_id,
                        index,
                        transient_attempts
                    );
                    self.settle(batch, index, DeliveryStatus::Failed).await?;
                    ItemOutcome::Failed(FailReason::RetriesExhausted)
                }
            };

            report.record(outcome);
            transient_attempts = 0;
            index += 1;
        }

        log::info!(
            "(run) Campaña {} finalizada: {}",
            batch.campaign_id,
            report
        );
        Ok(report)
    }

    async fn attempt(&self, batch: &CampaignBatch, slot: Option<&BlastItem>) -> Result<Attempt> {
        let campaign_id = batch.campaign_id.as_str();

        let Some(item) = slot else {
            return Ok(Attempt::Settled(ItemOutcome::Skipped(SkipReason::EmptySlot)));
        };

        if [
            batch.sender.as_str(),
            item.receiver.as_str(),
            item.message.as_str(),
        ]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            log::warn!(
                "(attempt) Campaña {}: ítem sin sender/receiver/message (receiver='{}'); se omite.",
                campaign_id,
                item.receiver
            );
            return Ok(Attempt::Settled(ItemOutcome::Skipped(SkipReason::MissingFields)));
        }

        // 1) Sólo se envía lo que sigue 'pending'
        let current = self
            .store
            .read(campaign_id, &item.receiver)
            .await
            .with_context(|| format!("Leyendo estado de {}/{}", campaign_id, item.receiver))?;
        if current != Some(DeliveryStatus::Pending) {
            log::debug!(
                "(attempt) {}/{} ya resuelto ({:?}); se omite.",
                campaign_id,
                item.receiver,
                current
            );
            return Ok(Attempt::Settled(ItemOutcome::Skipped(SkipReason::NotPending)));
        }

        // 2) Existencia del destinatario, sin reintentos
        let address = format_receiver(&item.receiver);
        match self.adapter.exists(&batch.sender, &address).await {
            Ok(true) => {}
            Ok(false) => {
                log::info!("(attempt) {} no existe en el proveedor.", address);
                self.write(campaign_id, &item.receiver, DeliveryStatus::Failed)
                    .await?;
                return Ok(Attempt::Settled(ItemOutcome::Failed(
                    FailReason::ReceiverUnreachable,
                )));
            }
            Err(e) => {
                log::error!("(attempt) Error verificando {}: {}", address, e);
                self.write(campaign_id, &item.receiver, DeliveryStatus::Failed)
                    .await?;
                return Ok(Attempt::Settled(ItemOutcome::Failed(
                    FailReason::ExistenceCheckError,
                )));
            }
        }

        // 3) Normalizar y enviar
        let adapter = self.adapter.clone();
        let randomize = move |text: &str| adapter.randomize_text(text);
        let call = match normalize(item.kind, &item.message, &randomize) {
            Ok(call) => call,
            Err(e) => {
                log::warn!(
                    "(attempt) {}/{}: {}; se omite.",
                    campaign_id,
                    item.receiver,
                    e
                );
                return Ok(Attempt::Settled(ItemOutcome::Skipped(
                    SkipReason::MalformedPayload,
                )));
            }
        };

        let (status, outcome) =
            match dispatch(self.adapter.as_ref(), &batch.sender, &address, &call).await {
                Ok(true) => (DeliveryStatus::Success, ItemOutcome::Success),
                Ok(false) => (
                    DeliveryStatus::Failed,
                    ItemOutcome::Failed(FailReason::Rejected),
                ),
                Err(e) if e.is_transient() => return Ok(Attempt::Transient(e)),
                Err(e) => {
                    log::error!("(attempt) Error enviando a {}: {}", address, e);
                    (
                        DeliveryStatus::Failed,
                        ItemOutcome::Failed(FailReason::SendError),
                    )
                }
            };

        self.write(campaign_id, &item.receiver, status).await?;
        Ok(Attempt::Settled(outcome))
    }

    async fn settle(&self, batch: &CampaignBatch, index: usize, status: DeliveryStatus) -> Result<()> {
        match batch.items[index].as_ref() {
            Some(item) => self.write(&batch.campaign_id, &item.receiver, status).await,
            None => Ok(()),
        }
    }

    async fn write(&self, campaign_id: &str, receiver: &str, status: DeliveryStatus) -> Result<()> {
        self.store
            .write(campaign_id, receiver, status)
            .await
            .with_context(|| format!("Escribiendo '{}' para {}/{}", status, campaign_id, receiver))
    }
}

/// Punto de entrada del motor: programa el lote y responde de inmediato.
#[derive(Clone)]
pub struct BlastService {
    processor: Arc<CampaignProcessor>,
    scheduler: CampaignScheduler,
}

impl BlastService {
    pub fn new(processor: CampaignProcessor, scheduler: CampaignScheduler) -> Self {
        Self {
            processor: Arc::new(processor),
            scheduler,
        }
    }

    /// Chequeo previo para no registrar filas de un lote que `submit` rechazaría.
    pub fn has_room(&self, campaign_id: &str) -> bool {
        self.scheduler.has_room(campaign_id)
    }

    /// `queued = false` si empezó a procesarse al instante; `true` si quedó
    /// detrás de otro lote de la misma campaña.
    pub fn submit(&self, batch: CampaignBatch) -> Result<SubmitAck, SubmissionError> {
        let campaign_id = batch.campaign_id.clone();
        let processor = self.processor.clone();

        let task: CampaignTask = Box::pin(async move { processor.run(&batch).await.map(|_| ()) });

        let started = self.scheduler.schedule(&campaign_id, task)?;
        Ok(SubmitAck { queued: !started })
    }
}

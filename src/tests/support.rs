//! tests/support.rs
//! Dobles de prueba: store en memoria, adaptador simulado y helpers.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::config::gateway_config::DispatchConfig;
use crate::errors::DeliveryError;
use crate::models::blast_model::{BlastItem, CampaignBatch, DeliveryStatus, MessageKind, PacingConfig};
use crate::models::message_model::{
    ButtonMessage, ListMessage, MediaMessage, PollMessage, ProviderCall, StickerMessage,
    TextMessage,
};
use crate::services::blast_service::CampaignProcessor;
use crate::services::delivery_service::{format_receiver, DeliveryAdapter};
use crate::services::status_service::{SqliteStatusStore, StatusStore};

// ----------------------------------------------------------------------------
// Store en memoria
// ----------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStatusStore {
    rows: Mutex<HashMap<(String, String), DeliveryStatus>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed<S: AsRef<str>>(&self, campaign_id: &str, receivers: &[S]) {
        let mut rows = self.rows.lock().unwrap();
        for r in receivers {
            rows.entry((campaign_id.to_string(), r.as_ref().to_string()))
                .or_insert(DeliveryStatus::Pending);
        }
    }

    pub fn set(&self, campaign_id: &str, receiver: &str, status: DeliveryStatus) {
        self.rows
            .lock()
            .unwrap()
            .insert((campaign_id.to_string(), receiver.to_string()), status);
    }

    pub fn get(&self, campaign_id: &str, receiver: &str) -> Option<DeliveryStatus> {
        self.rows
            .lock()
            .unwrap()
            .get(&(campaign_id.to_string(), receiver.to_string()))
            .copied()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn read(&self, campaign_id: &str, receiver: &str) -> Result<Option<DeliveryStatus>> {
        Ok(self.get(campaign_id, receiver))
    }

    async fn write(
        &self,
        campaign_id: &str,
        receiver: &str,
        status: DeliveryStatus,
    ) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        if let Some(current) = rows.get_mut(&(campaign_id.to_string(), receiver.to_string())) {
            *current = status;
        }
        Ok(())
    }
}

/// Store que falla para ciertos destinatarios; el resto delega en memoria.
#[derive(Default)]
pub struct FailingStatusStore {
    pub inner: MemoryStatusStore,
    failing_reads: HashSet<String>,
    failing_writes: HashSet<String>,
}

impl FailingStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_read(mut self, receiver: &str) -> Self {
        self.failing_reads.insert(receiver.to_string());
        self
    }

    pub fn failing_write(mut self, receiver: &str) -> Self {
        self.failing_writes.insert(receiver.to_string());
        self
    }
}

#[async_trait]
impl StatusStore for FailingStatusStore {
    async fn read(&self, campaign_id: &str, receiver: &str) -> Result<Option<DeliveryStatus>> {
        if self.failing_reads.contains(receiver) {
            return Err(anyhow!("database is locked"));
        }
        self.inner.read(campaign_id, receiver).await
    }

    async fn write(
        &self,
        campaign_id: &str,
        receiver: &str,
        status: DeliveryStatus,
    ) -> Result<()> {
        if self.failing_writes.contains(receiver) {
            return Err(anyhow!("disk I/O error"));
        }
        self.inner.write(campaign_id, receiver, status).await
    }
}

// ----------------------------------------------------------------------------
// Adaptador simulado
// ----------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SentMessage {
    pub address: String,
    pub call: ProviderCall,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Default)]
pub struct MockAdapter {
    unreachable: HashSet<String>,
    exists_errors: HashSet<String>,
    rejected: HashSet<String>,
    permanent_errors: HashSet<String>,
    /// Cuántos envíos más devolverán rate-limit, por dirección
    transient_left: Mutex<HashMap<String, u32>>,
    send_delay: Duration,
    exists_calls: Mutex<Vec<String>>,
    sends: Mutex<Vec<SentMessage>>,
    attempts: Mutex<Vec<String>>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unreachable(mut self, receiver: &str) -> Self {
        self.unreachable.insert(format_receiver(receiver));
        self
    }

    pub fn exists_error(mut self, receiver: &str) -> Self {
        self.exists_errors.insert(format_receiver(receiver));
        self
    }

    pub fn rejected(mut self, receiver: &str) -> Self {
        self.rejected.insert(format_receiver(receiver));
        self
    }

    pub fn permanent_error(mut self, receiver: &str) -> Self {
        self.permanent_errors.insert(format_receiver(receiver));
        self
    }

    pub fn transient_times(self, receiver: &str, times: u32) -> Self {
        self.transient_left
            .lock()
            .unwrap()
            .insert(format_receiver(receiver), times);
        self
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = delay;
        self
    }

    /// Envíos aceptados, en orden.
    pub fn sends(&self) -> Vec<SentMessage> {
        self.sends.lock().unwrap().clone()
    }

    pub fn sent_addresses(&self) -> Vec<String> {
        self.sends().into_iter().map(|s| s.address).collect()
    }

    /// Todas las llamadas de envío, incluidas las que fallaron.
    pub fn send_attempts(&self, receiver: &str) -> usize {
        let address = format_receiver(receiver);
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|a| **a == address)
            .count()
    }

    pub fn exists_calls(&self, receiver: &str) -> usize {
        let address = format_receiver(receiver);
        self.exists_calls
            .lock()
            .unwrap()
            .iter()
            .filter(|a| **a == address)
            .count()
    }

    async fn record_send(&self, receiver: &str, call: ProviderCall) -> Result<bool, DeliveryError> {
        let started = Instant::now();
        self.attempts.lock().unwrap().push(receiver.to_string());

        if !self.send_delay.is_zero() {
            tokio::time::sleep(self.send_delay).await;
        }

        {
            let mut transient = self.transient_left.lock().unwrap();
            if let Some(left) = transient.get_mut(receiver) {
                if *left > 0 {
                    *left -= 1;
                    return Err(DeliveryError::Transient("503 rate-overlimit".to_string()));
                }
            }
        }
        if self.permanent_errors.contains(receiver) {
            return Err(DeliveryError::Rejected("HTTP 500".to_string()));
        }
        if self.rejected.contains(receiver) {
            return Ok(false);
        }

        self.sends.lock().unwrap().push(SentMessage {
            address: receiver.to_string(),
            call,
            started,
            finished: Instant::now(),
        });
        Ok(true)
    }
}

#[async_trait]
impl DeliveryAdapter for MockAdapter {
    async fn exists(&self, _sender: &str, receiver: &str) -> Result<bool, DeliveryError> {
        self.exists_calls.lock().unwrap().push(receiver.to_string());
        if self.exists_errors.contains(receiver) {
            return Err(DeliveryError::Transport("connection reset".to_string()));
        }
        Ok(!self.unreachable.contains(receiver))
    }

    async fn send_text(
        &self,
        _sender: &str,
        receiver: &str,
        msg: &TextMessage,
    ) -> Result<bool, DeliveryError> {
        self.record_send(receiver, ProviderCall::Text(msg.clone())).await
    }

    async fn send_media(
        &self,
        _sender: &str,
        receiver: &str,
        msg: &MediaMessage,
    ) -> Result<bool, DeliveryError> {
        self.record_send(receiver, ProviderCall::Media(msg.clone())).await
    }

    async fn send_sticker(
        &self,
        _sender: &str,
        receiver: &str,
        msg: &StickerMessage,
    ) -> Result<bool, DeliveryError> {
        self.record_send(receiver, ProviderCall::Sticker(msg.clone())).await
    }

    async fn send_button(
        &self,
        _sender: &str,
        receiver: &str,
        msg: &ButtonMessage,
    ) -> Result<bool, DeliveryError> {
        self.record_send(receiver, ProviderCall::Button(msg.clone())).await
    }

    async fn send_list(
        &self,
        _sender: &str,
        receiver: &str,
        msg: &ListMessage,
    ) -> Result<bool, DeliveryError> {
        self.record_send(receiver, ProviderCall::List(msg.clone())).await
    }

    async fn send_poll(
        &self,
        _sender: &str,
        receiver: &str,
        msg: &PollMessage,
    ) -> Result<bool, DeliveryError> {
        self.record_send(receiver, ProviderCall::Poll(msg.clone())).await
    }
}

// ----------------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------------

pub const SENDER: &str = "6281200000000";

/// Número de prueba distinto por índice.
pub fn receiver(n: usize) -> String {
    format!("62811{:08}", n)
}

pub fn text_payload(text: &str) -> String {
    serde_json::json!({ "text": text }).to_string()
}

pub fn text_item(receiver: &str, text: &str) -> Option<BlastItem> {
    Some(BlastItem {
        receiver: receiver.to_string(),
        kind: MessageKind::Text,
        message: text_payload(text),
    })
}

pub fn batch(campaign_id: &str, items: Vec<Option<BlastItem>>) -> CampaignBatch {
    CampaignBatch {
        campaign_id: campaign_id.to_string(),
        sender: SENDER.to_string(),
        pacing: PacingConfig::default(),
        items,
    }
}

pub fn fast_config() -> DispatchConfig {
    DispatchConfig {
        transient_backoff_ms: 10,
        max_send_attempts: 10,
        queue_capacity: 8,
    }
}

pub fn processor(
    store: Arc<dyn StatusStore>,
    adapter: Arc<MockAdapter>,
    config: DispatchConfig,
) -> CampaignProcessor {
    CampaignProcessor::new(store, adapter, config)
}

pub async fn sqlite_store(path: &Path) -> SqliteStatusStore {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await
        .expect("No se pudo abrir SQLite de prueba");
    let store = SqliteStatusStore::new(pool);
    store.run_migrations().await.expect("Migraciones fallaron");
    store
}

/// Espera (sondeando) a que `cond` se cumpla.
pub async fn wait_until<F: Fn() -> bool>(cond: F, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

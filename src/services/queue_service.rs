//! services/queue_service.rs
//! Serialización por campaña: un worker por `campaign_id` que consume lotes
//! de un canal acotado, de a uno y en orden de llegada. Campañas distintas
//! corren en paralelo.

use std::collections::HashMap;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};

use futures_util::future::BoxFuture;
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::errors::SubmissionError;

/// Trabajo de una campaña. Sus errores se registran aquí y no llegan a quien programó.
pub type CampaignTask = BoxFuture<'static, anyhow::Result<()>>;

struct CampaignWorker {
    /// Identidad del worker; sólo él puede borrar su propia entrada
    generation: u64,
    sender: mpsc::Sender<CampaignTask>,
}

type WorkerMap = Arc<Mutex<HashMap<String, CampaignWorker>>>;

#[derive(Clone)]
pub struct CampaignScheduler {
    workers: WorkerMap,
    next_generation: Arc<AtomicU64>,
    queue_capacity: usize,
}

impl CampaignScheduler {
    pub fn new(queue_capacity: usize) -> Self {
        Self {
            workers: Arc::new(Mutex::new(HashMap::new())),
            next_generation: Arc::new(AtomicU64::new(1)),
            queue_capacity: queue_capacity.max(1),
        }
    }

    /// Encola `task` para `campaign_id`. Devuelve `true` si arrancó de inmediato
    /// (no había trabajo previo) y `false` si quedó detrás de otro lote.
    /// Debe llamarse dentro de un runtime de tokio.
    pub fn schedule(&self, campaign_id: &str, task: CampaignTask) -> Result<bool, SubmissionError> {
        let mut workers = lock(&self.workers);

        if let Some(worker) = workers.get(campaign_id) {
            return match worker.sender.try_send(task) {
                Ok(()) => {
                    log::info!(
                        "(schedule) Campaña {} ocupada; lote encolado detrás del anterior.",
                        campaign_id
                    );
                    Ok(false)
                }
                Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                    log::warn!(
                        "(schedule) Cola llena para campaña {} (capacidad={}).",
                        campaign_id,
                        self.queue_capacity
                    );
                    Err(SubmissionError::QueueFull(campaign_id.to_string()))
                }
            };
        }

        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        // Canal recién creado con capacidad >= 1: no puede estar lleno
        if sender.try_send(task).is_err() {
            return Err(SubmissionError::QueueFull(campaign_id.to_string()));
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        workers.insert(
            campaign_id.to_string(),
            CampaignWorker { generation, sender },
        );

        tokio::spawn(run_worker(
            campaign_id.to_string(),
            generation,
            receiver,
            self.workers.clone(),
        ));

        log::info!(
            "(schedule) Campaña {} iniciada de inmediato (worker #{}, campañas activas={}).",
            campaign_id,
            generation,
            workers.len()
        );
        Ok(true)
    }

    /// ¿Aceptaría `schedule` un lote más para `campaign_id` en este momento?
    pub fn has_room(&self, campaign_id: &str) -> bool {
        lock(&self.workers)
            .get(campaign_id)
            .map_or(true, |worker| worker.sender.capacity() > 0)
    }

    pub fn is_active(&self, campaign_id: &str) -> bool {
        lock(&self.workers).contains_key(campaign_id)
    }

    pub fn active_campaigns(&self) -> usize {
        lock(&self.workers).len()
    }
}

fn lock(workers: &WorkerMap) -> MutexGuard<'_, HashMap<String, CampaignWorker>> {
    // Ninguna sección crítica hace panic a mitad de una mutación
    workers.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn run_worker(
    campaign_id: String,
    generation: u64,
    mut receiver: mpsc::Receiver<CampaignTask>,
    workers: WorkerMap,
) {
    loop {
        // Revisar el canal y retirar la entrada bajo el mismo lock que usa
        // `schedule`; así ningún lote queda huérfano entre ambos pasos.
        let task = {
            let mut map = lock(&workers);
            match receiver.try_recv() {
                Ok(task) => task,
                Err(_) => {
                    if map.get(&campaign_id).map(|w| w.generation) == Some(generation) {
                        map.remove(&campaign_id);
                    }
                    log::info!(
                        "(run_worker) Campaña {} sin lotes pendientes; worker #{} finalizado.",
                        campaign_id,
                        generation
                    );
                    return;
                }
            }
        };

        // Cada lote en su propia task: un panic no tumba al worker
        match tokio::spawn(task).await {
            Ok(Ok(())) => {
                log::info!("(run_worker) Lote de campaña {} completado.", campaign_id);
            }
            Ok(Err(e)) => {
                log::error!(
                    "(run_worker) Falló el procesamiento de la campaña {}: {:?}",
                    campaign_id,
                    e
                );
            }
            Err(join_err) => {
                log::error!(
                    "(run_worker) El lote de campaña {} terminó abruptamente: {}",
                    campaign_id,
                    join_err
                );
            }
        }
    }
}

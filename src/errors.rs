//! errors.rs
//! Errores tipados del motor de campañas. Lo demás usa `anyhow`.

use thiserror::Error;

use crate::models::blast_model::MessageKind;

/// Rechazo de un lote antes de programarlo. No hay escrituras de estado.
#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("Invalid payload: {0}")]
    Malformed(String),

    #[error("Missing campaign identifier")]
    MissingCampaignId,

    #[error("Campaign {0} has too many batches waiting")]
    QueueFull(String),
}

/// El payload de un ítem no coincide con el tipo declarado.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Malformed {kind} payload: {reason}")]
    Malformed { kind: MessageKind, reason: String },
}

/// Fallos reportados por el adaptador de entrega.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Rate-limit del proveedor (marcador 503). Se reintenta en el mismo ítem.
    #[error("Transient provider error: {0}")]
    Transient(String),

    /// Error de red/HTTP hablando con el proveedor.
    #[error("Provider transport error: {0}")]
    Transport(String),

    /// El proveedor respondió con un error permanente.
    #[error("Provider rejected the request: {0}")]
    Rejected(String),
}

impl DeliveryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DeliveryError::Transient(_))
    }
}

//! models/blast_model.rs
//! Estructuras de un envío masivo (campaña): request, ítems, pacing y estados.

use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::SubmissionError;

/// Estado de entrega de (campaign_id, receiver) en la tabla `blasts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Success,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "pending",
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(DeliveryStatus::Pending),
            "success" => Ok(DeliveryStatus::Success),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(anyhow!("Estado desconocido: {other}")),
        }
    }
}

/// Tipo de mensaje; decide la rama del normalizador y el endpoint de envío.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Media,
    Sticker,
    Button,
    List,
    Poll,
}

impl MessageKind {
    /// Cualquier tag desconocido (o ausente) se trata como texto.
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(|t| t.trim().to_ascii_lowercase()).as_deref() {
            Some("media") => MessageKind::Media,
            Some("sticker") => MessageKind::Sticker,
            Some("button") => MessageKind::Button,
            Some("list") => MessageKind::List,
            Some("poll") => MessageKind::Poll,
            _ => MessageKind::Text,
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MessageKind::Text => "text",
            MessageKind::Media => "media",
            MessageKind::Sticker => "sticker",
            MessageKind::Button => "button",
            MessageKind::List => "list",
            MessageKind::Poll => "poll",
        };
        f.write_str(name)
    }
}

/// Ventana de espera entre mensajes, en milisegundos. Siempre min <= max.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PacingConfig {
    min_delay_ms: u64,
    max_delay_ms: u64,
}

impl PacingConfig {
    pub fn new(min_delay_ms: u64, max_delay_ms: u64) -> Self {
        PacingConfig {
            min_delay_ms,
            max_delay_ms: max_delay_ms.max(min_delay_ms),
        }
    }

    /// `delay` / `delay_max` llegan en segundos, como número o string numérico.
    /// Lo que no sea un número finito >= 0 se toma como 0.
    pub fn from_wire_seconds(delay: Option<&Value>, delay_max: Option<&Value>) -> Self {
        let min_secs = coerce_seconds(delay).unwrap_or(0.0).max(0.0);
        let max_secs = coerce_seconds(delay_max)
            .map(|secs| secs.max(min_secs))
            .unwrap_or(min_secs);

        PacingConfig::new(secs_to_ms(min_secs), secs_to_ms(max_secs))
    }

    pub fn min_delay_ms(&self) -> u64 {
        self.min_delay_ms
    }

    pub fn max_delay_ms(&self) -> u64 {
        self.max_delay_ms
    }

    pub fn is_enabled(&self) -> bool {
        self.min_delay_ms > 0 || self.max_delay_ms > 0
    }
}

fn coerce_seconds(value: Option<&Value>) -> Option<f64> {
    let secs = match value? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) if s.trim().is_empty() => 0.0,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => 0.0,
        _ => return None,
    };
    secs.is_finite().then_some(secs)
}

fn secs_to_ms(secs: f64) -> u64 {
    (secs * 1000.0).round() as u64
}

/// Un mensaje de la campaña, en el orden en que se envió.
#[derive(Debug, Clone)]
pub struct BlastItem {
    pub receiver: String,
    pub kind: MessageKind,
    /// Payload serializado (JSON) tal como llegó
    pub message: String,
}

/// Lote listo para el procesador. Los huecos (`None`) conservan su posición.
#[derive(Debug, Clone)]
pub struct CampaignBatch {
    pub campaign_id: String,
    pub sender: String,
    pub pacing: PacingConfig,
    pub items: Vec<Option<BlastItem>>,
}

impl CampaignBatch {
    /// Destinatarios no vacíos, para registrar las filas 'pending'.
    pub fn receivers(&self) -> impl Iterator<Item = &str> {
        self.items
            .iter()
            .flatten()
            .map(|item| item.receiver.as_str())
            .filter(|r| !r.trim().is_empty())
    }
}

// --------------------------------------------------------------------------------
// Formato de entrada (POST /api/blast)
// --------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct RawBlastItem {
    /// String o número; cualquier otro valor queda vacío y el ítem se omite
    pub receiver: Option<Value>,
    pub message: Option<Value>,
    /// Sobrescribe el `type` del lote para este ítem
    #[serde(rename = "type")]
    pub message_type: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlastSubmission {
    pub campaign_id: Option<Value>,
    pub sender: Option<Value>,
    #[serde(rename = "type")]
    pub message_type: Option<String>,
    pub delay: Option<Value>,
    pub delay_max: Option<Value>,
    pub data: Option<Vec<Option<RawBlastItem>>>,
}

impl BlastSubmission {
    /// Acepta el JSON directo o el envoltorio `{"data": "<json>"}` del formulario.
    pub fn parse(raw: &str) -> Result<Self, SubmissionError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| SubmissionError::Malformed(e.to_string()))?;

        // En el envoltorio `data` es un string; en el formato directo es un arreglo.
        let wrapped = match value.get("data") {
            Some(Value::String(inner)) => Some(inner.clone()),
            _ => None,
        };
        let value = match wrapped {
            Some(inner) => serde_json::from_str(&inner)
                .map_err(|e| SubmissionError::Malformed(e.to_string()))?,
            None => value,
        };

        serde_json::from_value(value).map_err(|e| SubmissionError::Malformed(e.to_string()))
    }

    /// Identificador de campaña; acepta números.
    pub fn campaign_id(&self) -> Option<String> {
        let id = scalar_text(self.campaign_id.as_ref()?)?.trim().to_string();
        (!id.is_empty()).then_some(id)
    }

    pub fn has_items(&self) -> bool {
        self.data.as_ref().is_some_and(|items| !items.is_empty())
    }

    pub fn into_batch(self) -> Result<CampaignBatch, SubmissionError> {
        let campaign_id = self.campaign_id().ok_or(SubmissionError::MissingCampaignId)?;
        let batch_kind = self.message_type.as_deref();
        let pacing = PacingConfig::from_wire_seconds(self.delay.as_ref(), self.delay_max.as_ref());

        let items = self
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|slot| {
                slot.map(|raw| BlastItem {
                    receiver: raw.receiver.as_ref().and_then(scalar_text).unwrap_or_default(),
                    kind: MessageKind::from_tag(raw.message_type.as_deref().or(batch_kind)),
                    message: match raw.message {
                        Some(Value::String(s)) => s,
                        Some(Value::Null) | None => String::new(),
                        Some(other) => other.to_string(),
                    },
                })
            })
            .collect();

        Ok(CampaignBatch {
            campaign_id,
            sender: self.sender.as_ref().and_then(scalar_text).unwrap_or_default(),
            pacing,
            items,
        })
    }
}

/// Strings y números (vienen así desde algunos paneles) como texto.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// --------------------------------------------------------------------------------
// Respuestas
// --------------------------------------------------------------------------------

/// Acuse inmediato de `submit`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SubmitAck {
    pub queued: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlastStatusRecord {
    pub receiver: String,
    pub status: DeliveryStatus,
    pub updated_at: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CampaignSummary {
    pub pending: u64,
    pub success: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CampaignStatusResponse {
    pub campaign_id: String,
    pub summary: CampaignSummary,
    pub items: Vec<BlastStatusRecord>,
}

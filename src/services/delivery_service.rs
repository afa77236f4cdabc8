//! services/delivery_service.rs
//! Adaptador de entrega: verificación de existencia y envío por tipo de mensaje
//! contra el bridge HTTP del proveedor de mensajería.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::seq::IndexedRandom;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use crate::config::gateway_config::GatewayConfig;
use crate::errors::DeliveryError;
use crate::models::message_model::{
    ButtonMessage, ListMessage, MediaMessage, PollMessage, ProviderCall, StickerMessage,
    TextMessage,
};

/// Marcador con el que el proveedor señala rate-limit/sobrecarga temporal.
const TRANSIENT_MARKER: &str = "503";

#[async_trait]
pub trait DeliveryAdapter: Send + Sync {
    /// ¿`receiver` es un destino válido para `sender`?
    async fn exists(&self, sender: &str, receiver: &str) -> Result<bool, DeliveryError>;

    async fn send_text(
        &self,
        sender: &str,
        receiver: &str,
        msg: &TextMessage,
    ) -> Result<bool, DeliveryError>;

    async fn send_media(
        &self,
        sender: &str,
        receiver: &str,
        msg: &MediaMessage,
    ) -> Result<bool, DeliveryError>;

    async fn send_sticker(
        &self,
        sender: &str,
        receiver: &str,
        msg: &StickerMessage,
    ) -> Result<bool, DeliveryError>;

    async fn send_button(
        &self,
        sender: &str,
        receiver: &str,
        msg: &ButtonMessage,
    ) -> Result<bool, DeliveryError>;

    async fn send_list(
        &self,
        sender: &str,
        receiver: &str,
        msg: &ListMessage,
    ) -> Result<bool, DeliveryError>;

    async fn send_poll(
        &self,
        sender: &str,
        receiver: &str,
        msg: &PollMessage,
    ) -> Result<bool, DeliveryError>;

    /// Variación de texto antes de enviar. Por defecto no cambia nada.
    fn randomize_text(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Enruta la llamada normalizada al endpoint de su tipo.
pub async fn dispatch(
    adapter: &dyn DeliveryAdapter,
    sender: &str,
    receiver: &str,
    call: &ProviderCall,
) -> Result<bool, DeliveryError> {
    match call {
        ProviderCall::Text(msg) => adapter.send_text(sender, receiver, msg).await,
        ProviderCall::Media(msg) => adapter.send_media(sender, receiver, msg).await,
        ProviderCall::Sticker(msg) => adapter.send_sticker(sender, receiver, msg).await,
        ProviderCall::Button(msg) => adapter.send_button(sender, receiver, msg).await,
        ProviderCall::List(msg) => adapter.send_list(sender, receiver, msg).await,
        ProviderCall::Poll(msg) => adapter.send_poll(sender, receiver, msg).await,
    }
}

/// Dirección canónica del proveedor. Grupos y canales pasan sin cambios.
pub fn format_receiver(raw: &str) -> String {
    if raw.ends_with("@g.us") || raw.ends_with("@newsletter") {
        return raw.to_string();
    }

    let mut number: String = raw.chars().filter(char::is_ascii_digit).collect();
    if number.starts_with("08") {
        number = format!("62{}", &number[1..]);
    }
    if let Some(stripped) = number.strip_prefix("00") {
        number = stripped.to_string();
    }
    number.push_str("@c.us");
    number
}

/// Resuelve grupos spintax `{hola|buenas|qué tal}` eligiendo una opción al azar.
/// Llaves sin `|` se dejan como están.
pub fn spin_text(text: &str) -> String {
    let mut rng = rand::rng();
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('{') {
        let Some(close_rel) = rest[open..].find('}') else {
            break;
        };
        let close = open + close_rel;
        let inner = &rest[open + 1..close];

        // Llave anidada o sin alternativas: copiamos el '{' literal y seguimos
        if inner.contains('{') || !inner.contains('|') {
            out.push_str(&rest[..=open]);
            rest = &rest[open + 1..];
            continue;
        }

        out.push_str(&rest[..open]);
        let options: Vec<&str> = inner.split('|').collect();
        if let Some(choice) = options.choose(&mut rng) {
            out.push_str(choice);
        }
        rest = &rest[close + 1..];
    }

    out.push_str(rest);
    out
}

fn is_transient_message(message: &str) -> bool {
    message.contains(TRANSIENT_MARKER)
}

// --------------------------------------------------------------------------------
// Implementación HTTP
// --------------------------------------------------------------------------------

#[derive(Clone)]
pub struct HttpDeliveryAdapter {
    http_client: Client,
    base_url: String,
}

impl HttpDeliveryAdapter {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.provider_timeout())
            .build()
            .context("No se pudo construir el cliente HTTP del proveedor")?;

        Ok(Self {
            http_client,
            base_url: config.provider_api_url.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json(&self, path: &str, payload: Value) -> Result<Value, DeliveryError> {
        let url = format!("{}/{}", self.base_url, path);
        log::debug!("(post_json) POST {}", url);

        let resp = self
            .http_client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(DeliveryError::Transient(format!("{path}: HTTP {status}")));
        }
        if !status.is_success() {
            let body_txt = resp.text().await.unwrap_or_default();
            log::error!(
                "(post_json) {} respondió {}. body_txt='{}'",
                path,
                status,
                body_txt
            );
            return Err(if is_transient_message(&body_txt) {
                DeliveryError::Transient(body_txt)
            } else {
                DeliveryError::Rejected(format!("HTTP {status}: {body_txt}"))
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))
    }

    /// `{status: bool, message?}`; un `status:false` con el marcador 503 es transitorio.
    async fn send(&self, path: &str, payload: Value) -> Result<bool, DeliveryError> {
        let json_val = self.post_json(path, payload).await?;
        let accepted = json_val
            .get("status")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        if !accepted {
            let message = json_val
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if is_transient_message(message) {
                return Err(DeliveryError::Transient(message.to_string()));
            }
            log::warn!("(send) {} no aceptado por el proveedor: {:?}", path, json_val);
        }
        Ok(accepted)
    }
}

#[async_trait]
impl DeliveryAdapter for HttpDeliveryAdapter {
    async fn exists(&self, sender: &str, receiver: &str) -> Result<bool, DeliveryError> {
        let json_val = self
            .post_json("check-number", json!({ "token": sender, "number": receiver }))
            .await?;

        Ok(json_val
            .get("active")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    async fn send_text(
        &self,
        sender: &str,
        receiver: &str,
        msg: &TextMessage,
    ) -> Result<bool, DeliveryError> {
        self.send(
            "send-message",
            json!({ "token": sender, "number": receiver, "message": msg }),
        )
        .await
    }

    async fn send_media(
        &self,
        sender: &str,
        receiver: &str,
        msg: &MediaMessage,
    ) -> Result<bool, DeliveryError> {
        self.send(
            "send-media",
            json!({
                "token": sender,
                "number": receiver,
                "type": msg.media_type,
                "url": msg.url,
                "caption": msg.caption.clone().unwrap_or_default(),
                "viewonce": msg.viewonce,
                "filename": msg.filename,
            }),
        )
        .await
    }

    async fn send_sticker(
        &self,
        sender: &str,
        receiver: &str,
        msg: &StickerMessage,
    ) -> Result<bool, DeliveryError> {
        self.send(
            "send-sticker",
            json!({
                "token": sender,
                "number": receiver,
                "type": msg.sticker_type,
                "url": msg.url,
                "filename": msg.filename,
            }),
        )
        .await
    }

    async fn send_button(
        &self,
        sender: &str,
        receiver: &str,
        msg: &ButtonMessage,
    ) -> Result<bool, DeliveryError> {
        self.send(
            "send-button",
            json!({
                "token": sender,
                "number": receiver,
                "button": msg.buttons,
                "message": msg.caption,
                "footer": msg.footer,
                "image": msg.image_url,
            }),
        )
        .await
    }

    async fn send_list(
        &self,
        sender: &str,
        receiver: &str,
        msg: &ListMessage,
    ) -> Result<bool, DeliveryError> {
        self.send(
            "send-list",
            json!({
                "token": sender,
                "number": receiver,
                "list": msg.sections,
                "text": msg.text,
                "footer": msg.footer.clone().unwrap_or_default(),
                "title": msg.title,
                "buttonText": msg.button_text,
            }),
        )
        .await
    }

    async fn send_poll(
        &self,
        sender: &str,
        receiver: &str,
        msg: &PollMessage,
    ) -> Result<bool, DeliveryError> {
        self.send(
            "send-poll",
            json!({
                "token": sender,
                "number": receiver,
                "name": msg.name,
                "options": msg.options,
                "countable": msg.countable,
            }),
        )
        .await
    }

    fn randomize_text(&self, text: &str) -> String {
        spin_text(text)
    }
}

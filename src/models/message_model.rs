//! models/message_model.rs
//! Payloads por tipo de mensaje: lo que llega en `message` y lo que se entrega al proveedor.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Texto (y cualquier otro tipo no reconocido). Campos extra se reenvían tal cual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaMessage {
    /// image, video, audio, document...
    #[serde(rename = "type")]
    pub media_type: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(default)]
    pub viewonce: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickerMessage {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub sticker_type: Option<String>,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

// ----------------------------------------------------------------------------
// Botones
// ----------------------------------------------------------------------------

/// `buttonText.displayText` puede ser un descriptor completo o sólo el texto.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawButtonLabel {
    Descriptor(RawButtonDescriptor),
    Plain(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawButtonDescriptor {
    #[serde(rename = "type")]
    pub button_type: Option<String>,
    pub display_text: Option<String>,
    pub phone_number: Option<String>,
    pub url: Option<String>,
    pub copy_code: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawButtonText {
    pub display_text: Option<RawButtonLabel>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawButton {
    pub button_id: Option<String>,
    #[serde(default)]
    pub button_text: Option<RawButtonText>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawImage {
    pub url: Option<String>,
}

/// Lo que llega en `message` para tipo `button`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawButtonGroup {
    pub buttons: Vec<RawButton>,
    pub caption: Option<String>,
    pub text: Option<String>,
    pub footer: Option<String>,
    pub image: Option<RawImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedButton {
    /// reply, copy, url, call
    #[serde(rename = "type")]
    pub button_type: String,
    pub display_text: Option<String>,
    pub id: Option<String>,
    pub phone_number: Option<String>,
    pub url: Option<String>,
    pub copy_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ButtonMessage {
    pub buttons: Vec<NormalizedButton>,
    pub caption: String,
    pub footer: Option<String>,
    pub image_url: Option<String>,
}

// ----------------------------------------------------------------------------
// Listas y encuestas (se reenvían sin transformar)
// ----------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListMessage {
    pub text: String,
    #[serde(alias = "list")]
    pub sections: Value,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub footer: Option<String>,
    #[serde(default)]
    pub button_text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollMessage {
    pub name: String,
    pub options: Vec<String>,
    #[serde(default, alias = "selectableCount")]
    pub countable: Option<u32>,
}

/// Llamada lista para el adaptador de entrega, una variante por tipo.
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderCall {
    Text(TextMessage),
    Media(MediaMessage),
    Sticker(StickerMessage),
    Button(ButtonMessage),
    List(ListMessage),
    Poll(PollMessage),
}

//! services/payload_service.rs
//! Normaliza el `message` crudo de cada ítem a una llamada tipada del proveedor.
//! Funciones puras: sin I/O ni estado.

use serde::de::DeserializeOwned;

use crate::errors::PayloadError;
use crate::models::blast_model::MessageKind;
use crate::models::message_model::{
    ButtonMessage, MediaMessage, NormalizedButton, ProviderCall, RawButton, RawButtonDescriptor,
    RawButtonGroup, RawButtonLabel, TextMessage,
};

const DEFAULT_BUTTON_TYPE: &str = "reply";

/// Convierte `raw` según `kind`. `randomize` es la transformación de texto
/// que expone el adaptador de entrega; se aplica tal cual.
pub fn normalize(
    kind: MessageKind,
    raw: &str,
    randomize: &dyn Fn(&str) -> String,
) -> Result<ProviderCall, PayloadError> {
    let call = match kind {
        MessageKind::Media => ProviderCall::Media(normalize_media(parse(kind, raw)?)),
        MessageKind::Sticker => ProviderCall::Sticker(parse(kind, raw)?),
        MessageKind::Button => ProviderCall::Button(normalize_buttons(parse(kind, raw)?)),
        MessageKind::List => ProviderCall::List(parse(kind, raw)?),
        MessageKind::Poll => ProviderCall::Poll(parse(kind, raw)?),
        MessageKind::Text => ProviderCall::Text(normalize_text(parse(kind, raw)?, randomize)),
    };
    Ok(call)
}

fn parse<T: DeserializeOwned>(kind: MessageKind, raw: &str) -> Result<T, PayloadError> {
    serde_json::from_str(raw).map_err(|e| PayloadError::Malformed {
        kind,
        reason: e.to_string(),
    })
}

/// Footer como línea final en cursiva/cita.
pub fn styled_footer(footer: &str) -> String {
    format!("> _{footer}_")
}

fn non_blank(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.trim().is_empty())
}

fn normalize_media(mut media: MediaMessage) -> MediaMessage {
    if !non_blank(&media.footer) {
        return media;
    }
    let footer = styled_footer(media.footer.as_deref().unwrap_or_default());

    media.caption = Some(match media.caption.take() {
        Some(caption) if !caption.trim().is_empty() => format!("{caption}\n\n{footer}"),
        _ => footer,
    });
    media.footer = None;
    media
}

fn normalize_text(mut msg: TextMessage, randomize: &dyn Fn(&str) -> String) -> TextMessage {
    if let (Some(text), Some(footer)) = (msg.text.as_deref(), msg.footer.as_deref()) {
        if !text.trim().is_empty() && !footer.is_empty() {
            let merged = format!("{text}\n\n{}", styled_footer(footer));
            msg.text = Some(randomize(&merged));
            msg.footer = None;
        }
    }
    msg
}

fn normalize_buttons(group: RawButtonGroup) -> ButtonMessage {
    let caption = [group.caption.as_deref(), group.text.as_deref()]
        .into_iter()
        .flatten()
        .find(|c| !c.is_empty())
        .unwrap_or_default()
        .to_string();

    ButtonMessage {
        buttons: group.buttons.into_iter().map(normalize_button).collect(),
        caption,
        footer: group.footer,
        image_url: group.image.and_then(|img| img.url),
    }
}

fn normalize_button(raw: RawButton) -> NormalizedButton {
    let label = raw.button_text.and_then(|t| t.display_text);
    let descriptor = match label {
        Some(RawButtonLabel::Descriptor(d)) => d,
        Some(RawButtonLabel::Plain(text)) => RawButtonDescriptor {
            display_text: Some(text),
            ..Default::default()
        },
        None => RawButtonDescriptor::default(),
    };

    NormalizedButton {
        button_type: descriptor
            .button_type
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_BUTTON_TYPE.to_string()),
        display_text: descriptor.display_text,
        id: raw.button_id,
        phone_number: descriptor.phone_number,
        url: descriptor.url,
        copy_code: descriptor.copy_code,
    }
}

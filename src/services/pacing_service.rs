//! services/pacing_service.rs
//! Espera entre mensajes de una campaña para cuidar la conexión compartida con el proveedor.

use std::time::Duration;

use rand::Rng;

use crate::models::blast_model::PacingConfig;

/// Entero uniforme en [min, max] si max > min; si no, exactamente min.
pub fn next_delay(min_delay_ms: u64, max_delay_ms: u64) -> u64 {
    if max_delay_ms > min_delay_ms {
        rand::rng().random_range(min_delay_ms..=max_delay_ms)
    } else {
        min_delay_ms
    }
}

/// Duerme el delay de la campaña. Con delay 0 no se suspende.
pub async fn pace(pacing: &PacingConfig) -> u64 {
    if !pacing.is_enabled() {
        return 0;
    }
    let delay_ms = next_delay(pacing.min_delay_ms(), pacing.max_delay_ms());
    if delay_ms > 0 {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
    delay_ms
}

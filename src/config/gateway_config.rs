//! config/gateway_config.rs
//! Configuración global del gateway (servidor, base de datos, proveedor y despacho).

use std::{env, str::FromStr, time::Duration};

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

/// Parámetros del motor de despacho de campañas.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Espera fija antes de reintentar un envío rechazado por rate-limit (503)
    pub transient_backoff_ms: u64,
    /// Intentos de envío por ítem antes de marcarlo 'failed'
    pub max_send_attempts: u32,
    /// Capacidad del canal de cada campaña (lotes en espera)
    pub queue_capacity: usize,
}

impl DispatchConfig {
    pub fn transient_backoff(&self) -> Duration {
        Duration::from_millis(self.transient_backoff_ms)
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        DispatchConfig {
            transient_backoff_ms: 5000,
            max_send_attempts: 10,
            queue_capacity: 64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// URL base del bridge del proveedor de mensajería
    pub provider_api_url: String,
    pub provider_timeout_secs: u64,
    pub dispatch: DispatchConfig,
}

impl GatewayConfig {
    /// Lee la configuración desde variables de entorno (después de `dotenv()`).
    pub fn from_env() -> Result<Self> {
        let defaults = DispatchConfig::default();

        let provider_api_url = env::var("PROVIDER_API_URL")
            .map_err(|_| anyhow!("No se definió PROVIDER_API_URL"))?;

        Ok(GatewayConfig {
            host: env::var("BLAST_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("BLAST_PORT", 5022)?,
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:data/blasts.db".to_string()),
            provider_api_url,
            provider_timeout_secs: env_or("PROVIDER_TIMEOUT_SECS", 30)?,
            dispatch: DispatchConfig {
                transient_backoff_ms: env_or(
                    "TRANSIENT_BACKOFF_MS",
                    defaults.transient_backoff_ms,
                )?,
                max_send_attempts: env_or("MAX_SEND_ATTEMPTS", defaults.max_send_attempts)?,
                queue_capacity: env_or("CAMPAIGN_QUEUE_CAPACITY", defaults.queue_capacity)?,
            },
        })
    }

    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

/// Variable numérica opcional; si existe pero no parsea, es un error.
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Valor inválido para {key}: '{raw}'")),
        Err(_) => Ok(default),
    }
}

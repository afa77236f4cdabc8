//! services/mod.rs
//! Módulo que agrupa distintos "servicios" o "capas de negocio" de la app.

pub mod blast_service;
pub mod delivery_service;
pub mod pacing_service;
pub mod payload_service;
pub mod queue_service;
pub mod status_service;

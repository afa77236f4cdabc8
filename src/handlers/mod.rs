//! handlers/mod.rs
//! Módulo que agrupa los handlers HTTP.
pub mod blast_handler;

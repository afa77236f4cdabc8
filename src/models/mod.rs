//! models/mod.rs
//! Módulo raíz para modelos/estructuras compartidas.

pub mod blast_model;
pub mod message_model;

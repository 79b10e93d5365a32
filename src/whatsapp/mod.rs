//! WhatsApp Cloud API integration

pub mod client;

pub use client::{normalizar_telefone, WhatsAppClient};

pub mod api;
pub mod auth;
pub mod banco;
pub mod config;
pub mod database;
pub mod error;
pub mod pesquisa;
pub mod webhooks;
pub mod whatsapp;

pub use error::PesquisaError;

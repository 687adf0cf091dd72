//! Downstream HTTP clients

pub mod ollama;
pub mod trends;

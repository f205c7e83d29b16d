//! Order service: Redpanda ingestion, Postgres Record Store, TTL cache and a
//! read-only HTTP API.
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────┐
//!   orders topic  │    Ingestion     │  invalid / undecodable: dropped
//!  ─────────────▶ │    Pipeline      │ ─────────────────────────────────▶
//!                 └──────────────────┘
//!                    │ persist    │ exhausted retries
//!                    ▼            ▼
//!        ┌────────────────┐   ┌──────────────┐
//!        │ Retrying store │   │  DLQ topic   │
//!        │   (Postgres)   │   └──────────────┘
//!        └────────────────┘
//!           ▲         │ on success
//!  fallback │         ▼
//!        ┌────────────────┐        ┌──────────────┐
//!        │  Query Service │ ◀────▶ │  TTL Cache   │
//!        └────────────────┘        └──────────────┘
//!                ▲
//!   GET /orders/{id}
//! ```
//!
//! Two binaries are built from this crate:
//!
//! - `orderstream`: the service itself ([`app::Application`])
//! - `order-producer`: publishes demo traffic ([`producer::run_producer`])

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod app;
pub mod config;
pub mod producer;
pub mod telemetry;

pub use app::{Application, shutdown_signal};
pub use config::Config;

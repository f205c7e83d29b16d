//! `PostgreSQL` Record Store for the order service.
//!
//! This crate provides [`PostgresOrderRepository`], which implements the
//! `OrderRepository` trait from `orderstream-core` on top of sqlx. It supports:
//!
//! - Transactional writes of the four-table order aggregate
//! - Point reads that reassemble the aggregate in item order
//! - Listing of recently created orders for cache warm-up
//! - Embedded schema migrations
//! - Error classification into transient and terminal failures
//!
//! # Example
//!
//! ```ignore
//! use orderstream_postgres::PostgresOrderRepository;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresOrderRepository::connect("postgres://localhost/orders", 10).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
mod repository;

pub use repository::PostgresOrderRepository;

//! Quote Budget Backend
//!
//! Layered architecture:
//! - domain: Core entities and business rules
//! - budget: Budget tree, lifecycle operations and aggregation
//! - render: Actual spend tracking and variance against the budget
//! - repository: Data access abstractions and implementations
//! - services: Currency display, invoice extraction, export
//! - commands: Session façade driving all of the above

pub mod domain;
pub mod budget;
pub mod render;
pub mod repository;
pub mod services;
pub mod commands;

pub use commands::QuoteSession;

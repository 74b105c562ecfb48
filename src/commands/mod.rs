//! Commands Layer
//!
//! Entry points a frontend or the CLI calls into.

mod session;

pub use session::QuoteSession;

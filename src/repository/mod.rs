//! Repository Layer
//!
//! Abstracts data persistence with async traits.
//! Currently implemented with SQLite (rusqlite).

mod traits;
mod db;
mod state_repo;
mod render_repo;
mod quote_repo;


pub use traits::{StateRepository, VersionedState};
pub use db::{init_db, DbState, SharedConnection};
pub use state_repo::JsonStateRepository;
pub use render_repo::{RenderStateRepository, RENDER_STORE_KEY};
pub use quote_repo::{QuoteRepository, SavedQuote, QUOTE_KEY};

//! AML Store - persistence for checks, audit history and the polling queue
//!
//! The screening flow only talks to [`ScreeningStore`]; [`SqliteStore`] is
//! the bundled implementation. Tables:
//!
//! - `checks`: one row per screening, never deleted
//! - `check_history`: one immutable row per provider interaction, `(check_id, attempt)` unique
//! - `check_queue`: one row per pending check
//! - `credentials`, `provider_currencies`, `users`: reference data

pub mod error;
mod schema;
pub mod sqlite;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use sqlite::SqliteStore;
pub use traits::{AuditReport, CheckFilter, PollDecision, ScreeningStore};

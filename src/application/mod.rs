// Application layer - use cases and orchestration.
// `LedgerService` owns the atomic balance-and-audit operation; `AccountService`
// covers account management and read-only reports.

pub mod accounts;
pub mod error;
pub mod reporting;
pub mod service;

pub use accounts::*;
pub use error::*;
pub use reporting::*;
pub use service::*;

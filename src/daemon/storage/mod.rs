//!  Storage is organized through [ledger_storage::LedgerStorage].
//!  The basic idea is:
//!   - There is a data directory owned by the tracker.
//!   - `usage_data.json` holds the authoritative usage-by-application ledger.
//!   - `current_process_data.json` mirrors the tracked process snapshot for
//!     inspection and is overwritten every poll cycle.

pub mod entities;
pub mod ledger;
pub mod ledger_storage;
pub mod query;

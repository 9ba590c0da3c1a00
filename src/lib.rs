// Cattle Weighing - Core Library
// Weighing sheets, person directory and access policy, shared by the CLI,
// the API server and the tests

pub mod access;
pub mod accounts;
pub mod config;
pub mod directory;
pub mod error;
pub mod intake;
pub mod model;
pub mod queries;
pub mod sheets;
pub mod store;

#[cfg(feature = "server")]
pub mod api;

// Re-export commonly used types
pub use access::{can_administer, can_mutate_cattle, can_view, Caller};
pub use accounts::{hash_password, verify_password, AccountService, AccountSummary, ClientRegistration};
pub use directory::{BackfillReport, PersonDirectory, SEARCH_LIMIT};
pub use error::{DomainError, Result, StoreError};
pub use intake::{intake_persons, load_person_csv, IntakeReport, PersonRecord};
pub use model::{
    Account, CattleEntry, CattleType, EntryInput, Person, PersonSummary, RawWeight, Role, Sex,
    SheetDetail, SheetSummary, SheetTotals, WeighingSheet,
};
pub use queries::{ListQuery, SheetQueries, SUGGEST_LIMIT, SUGGEST_MIN_CHARS};
pub use sheets::{AppendedEntry, CounterpartyRef, SheetManager};
pub use store::{setup_database, SqliteStore, Store};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

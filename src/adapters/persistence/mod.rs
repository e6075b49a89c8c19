//! Persistence adapters: run state file, dry-run wrapper, CSV archive.

pub mod csv_archive;
pub mod read_only;
pub mod state_json;

pub use csv_archive::CsvArchive;
pub use read_only::ReadOnlyState;
pub use state_json::StateJson;

//! Save file migration
//!
//! `legacy` rewrites old per-document label flags in place; `upgrade`
//! turns any supported save file into the current typed schema.

mod legacy;
mod upgrade;

pub use legacy::{migrate_entries, migrate_entry, LegacyShape, MigrationReport};
pub use upgrade::{parse_save, upgrade, LoadError, Upgrade};

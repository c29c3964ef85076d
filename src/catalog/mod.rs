//! Catalog of converted imagery: record types, search queries, and persistence.

pub mod query;
mod record;
mod repository;

pub use query::{Page, PageRequest, SearchCriteria, SortDirection, SortKey, SortSpec};
pub use record::{ImageryRecord, NewImageryRecord};
pub use repository::{ImageryRepository, SqlImageryRepository};

#[cfg(test)]
pub(crate) use repository::tests::test_repository;

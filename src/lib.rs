pub mod error;
pub mod export;
pub mod facts;
pub mod format;
pub mod models;
pub mod output;
pub mod reduce;
pub mod rollup;
pub mod thumbs;

pub use error::{RollupError, SkipReason};
pub use rollup::{rollup_library, LibraryDocument, LibraryKind, Rollup, RunReport};

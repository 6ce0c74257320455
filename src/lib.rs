//! # FRS results database
//!
//! Reader for `.frs` simulation results files. Each file carries a text
//! header describing a hierarchy of object groups, item groups and
//! variables, followed by fixed-width binary time steps. Any number of
//! files (a run, its restarts, separate result sets) are merged into one
//! hierarchy and read at a common time position.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (DataType, errors, arena pool, math)
//! - [`frs`] - File format: header parsing, byte streams, writer
//! - [`core`] - Schema, live entry tree, containers and time indices
//! - [`rdb`] - The [`Extractor`](rdb::Extractor): search, positioning, typed reads
//!
//! ## Example
//!
//! ```ignore
//! use frs_rdb::prelude::*;
//!
//! let mut rdb = Extractor::new();
//! rdb.add_file("run1.frs")?;
//! let time = rdb.search(&ResultDescription::top_level("Physical time")).unwrap();
//!
//! rdb.reset_positioning();
//! let mut t = [0.0];
//! while rdb.get_single_time_step_data(time, &mut t) == 1 {
//!     println!("{}", t[0]);
//!     if !rdb.increment() {
//!         break;
//!     }
//! }
//! ```

pub mod util;
pub mod frs;
pub mod core;
pub mod rdb;

// Re-export commonly used types
pub use util::{DataType, Error, Result};
pub use rdb::{Extractor, ExtractorConfig, ResultDescription};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{DataType, Error, Result};
    pub use crate::core::{ContainerId, EntryId, Variable};
    pub use crate::rdb::{Extractor, ExtractorConfig, ReadOperation, ResultDescription, Value};
}

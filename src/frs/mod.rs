//! Low-level results file format.
//!
//! ## File structure
//!
//! ```text
//! #<tag, 32 bytes>                 file tag
//! <endian: 2 bytes>                0x12 0x34 = big, 0x34 0x12 = little
//! <checksum: 8 bytes>              ignored by the reader
//! MODULE = <name>;                 headings
//! DATETIME = 19 Oct 2026 12:00:00;
//! VARIABLES:                       definitions only
//!   <id;name;unit;type;bits;class;(blockSizes);(blockDescr)>
//!   [id;name-or-int;references]
//! DATABLOCKS:                      per-step layout
//!   {type;baseId;id;description;references}
//!   <id>  [id]
//! DATA:<fixed width binary time steps>
//! ```

pub mod format;
pub mod header;
pub mod reader;
pub mod tokenizer;
pub mod writer;

pub use format::{Endian, TIME_EPS};
pub use header::{EntryKind, FileHeader, RawEntry, Section};
pub use reader::FrsStreams;
pub use writer::{FrsWriter, StepBuffer};

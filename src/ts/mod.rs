//! Reading and writing TS translation documents
//!
//! The document layout follows the Qt Linguist format:
//!
//! ```text
//! <TS version="2.1" language="fr_FR">
//! <context>
//!     <name>Core::MainWindow</name>
//!     <message numerus="yes">
//!         <location filename="mainwindow.cpp" line="42"/>
//!         <source>%n file(s) found</source>
//!         <comment>disambiguation</comment>
//!         <translation type="unfinished">
//!             <numerusform>...</numerusform>
//!         </translation>
//!     </message>
//! </context>
//! </TS>
//! ```

mod parser;
mod serializer;
mod xml;

pub use parser::{ParsedDocument, parse_file, parse_str};
pub use serializer::{to_string, write_file};

pub(crate) const TS_ROOT: &str = "TS";

/// Merge bookkeeping for obsolete messages, stored as an opaque extra element.
pub(crate) const ABSENT_MERGES_TAG: &str = "extra-absent-merges";

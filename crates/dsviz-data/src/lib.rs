//! Study data model for the design-space pipeline.
//!
//! This crate owns everything that describes the raw study data before any
//! numerical analysis happens:
//!
//! - [`table`]: a string-typed table read from and written to CSV, the shape
//!   every spreadsheet export takes when it enters the pipeline
//! - [`solution`]: identifiers of a solution and its study phase
//! - [`masking`]: the random-to-original ID keys used to anonymize the study,
//!   and the gallery fallbacks applied after unmasking
//! - [`palette`]: per-participant colours
//! - [`savefile`]: the parsed game save layout and the quantitative summary
//!   derived from it
//!
//! # Examples
//!
//! ```
//! use dsviz_data::{solution::Phase, table::Table};
//!
//! let csv = "FullID,ParticipantID,PrePost\nA-1,A,Pre\nA-2,A,Pst\n";
//! let table = Table::from_reader(csv.as_bytes()).unwrap();
//! assert_eq!(table.len(), 2);
//!
//! let phase: Phase = table.value(1, "PrePost").unwrap().unwrap().parse().unwrap();
//! assert_eq!(phase, Phase::Post);
//! ```

pub mod masking;
pub mod palette;
pub mod savefile;
pub mod solution;
pub mod table;

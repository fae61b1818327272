//! Helpers around a FragPipe search: building the search database, writing
//! the manifest and annotating the results.

pub mod annotate;
pub mod database;
pub mod fasta;
pub mod manifest;

/*
[INPUT]:  Listing page schema and normalized table requirements
[OUTPUT]: Typed Rust structs/enums shared across the pipeline
[POS]:    Data layer - type definitions
[UPDATE]: When the data model changes
*/

pub mod models;

pub use models::*;

//! Boundary adapters: CSV input and output for the command-line front end.

pub mod commands;
pub mod csv;

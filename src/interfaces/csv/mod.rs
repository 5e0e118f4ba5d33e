pub mod account_writer;
pub mod command_reader;
pub mod record_writer;

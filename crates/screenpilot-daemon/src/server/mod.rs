//! Line-delimited JSON server for the screenpilot daemon.
//!
//! Requests arrive one per line on the reader and responses are written one
//! per line on the writer, in request order.

mod handler;
mod stdio;

pub use handler::{handle_line, handle_request};
pub use stdio::{serve, write_response};

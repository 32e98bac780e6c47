//! Bot module - update handling and the HTTP runtime.

pub mod dispatcher;
mod runtime;
pub mod server;
mod state;
#[cfg(test)]
pub mod testing;

pub use runtime::run;
pub use state::AppState;

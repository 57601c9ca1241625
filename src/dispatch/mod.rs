//! Server-side command dispatch: method routing, parameter validation,
//! and failure-to-response mapping.

pub mod dispatcher;

pub use dispatcher::CommandDispatcher;

pub mod common;
pub mod completions;
pub mod ledger;
pub mod queue;
pub mod register;
pub mod submit;
pub mod sync;

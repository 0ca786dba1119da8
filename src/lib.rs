pub mod backend;
pub mod compile;
pub mod diagnostics;
pub mod frontend;
pub mod index;
pub mod middle;

pub use compile::{CompileOptions, compile};

pub mod render;

pub use render::{CompileOptions, Compiler};

pub mod character;
pub mod job;

pub use character::*;
pub use job::*;

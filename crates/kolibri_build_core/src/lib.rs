pub mod completion;
pub mod protocol;
pub mod types;

mod result;

pub use result::*;

pub mod ast;
pub mod builder;
pub mod error;
pub mod parser;

pub use builder::{build_model, ModelBuilder, TIME};
pub use error::{ValidationError, ValidationErrors};
pub use parser::{parse_string, DaeParser};

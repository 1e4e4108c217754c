mod error;
mod groq;

pub use error::{SemanticError, SemanticErrorKind};
pub use groq::GroqClient;

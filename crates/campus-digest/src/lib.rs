pub mod error;
pub mod gemini;
pub mod panel;
pub mod summarizer;

pub use error::SummaryError;
pub use gemini::{GeminiClient, GeminiConfig, Generator};
pub use panel::{DigestPanel, DigestTicket};
pub use summarizer::Summarizer;

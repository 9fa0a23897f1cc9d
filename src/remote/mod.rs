//! Concrete HTTP adapters behind the collaborator traits.

pub mod backend;
pub mod gemini;

pub use backend::BackendClient;
pub use gemini::GeminiOcr;

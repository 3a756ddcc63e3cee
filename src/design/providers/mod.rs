//! Remote room designers.

mod gemini;

pub use gemini::{GeminiImageModel, GeminiProvider, GeminiProviderBuilder, GeminiTextModel};

/// Health analysis service and text generation backends
pub mod analyzer;
pub mod backends;

pub use analyzer::{parse_response, HealthAnalyzer, UserProfile};
pub use backends::{
    GeminiBackend, MockBackend, OllamaBackend, OpenAIBackend, TextGenerator,
};

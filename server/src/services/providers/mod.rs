/// Outbound AI provider clients
///
/// Thin reqwest wrappers. Every client takes its base URL at construction
/// so tests can point it at a mock server.
pub mod elevenlabs;
pub mod openrouter;
pub mod pexels;

pub use elevenlabs::ElevenLabsClient;
pub use openrouter::OpenRouterClient;
pub use pexels::PexelsClient;

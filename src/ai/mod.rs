mod enricher;
mod gemini;
mod openai;
mod prompt;
mod provider;
mod registry;

pub use enricher::Enricher;
pub use provider::SummaryProvider;
pub use registry::ProviderRegistry;

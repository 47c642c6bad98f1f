mod query;
mod server;

pub use query::{QueryEngine, TrendingParams};
pub use server::run_server;

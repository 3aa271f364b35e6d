mod aggregate;
mod types;

pub use aggregate::{aggregate, top_entries};
pub use types::{AgentStats, RecapStats};

mod build;
mod enrich;
mod error;
mod model;
mod pipeline;
mod redact;
mod resolve;

pub use build::{build_unit, extract_repo, BuildOutcome};
pub use enrich::enrich;
pub use error::CoreError;
pub use model::{AgentReport, Session, Skip};
pub use pipeline::{run_agent, AgentRun, PipelineConfig};
pub use redact::apply_tier;
pub use resolve::{field_spec, walk, AgentFieldSpec, FieldRule, Resolver, LEADING_SCAN_LIMIT};

mod archetype;
mod matcher;
mod topic;
mod vibe;

pub use archetype::{classify_prompt, detect_archetype, Archetype};
pub use topic::{detect_topic, Topic};
pub use vibe::{detect_vibe, Vibe, VibeMatch};

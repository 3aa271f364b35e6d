mod claude;
mod codex;
mod cursor;
mod error;
mod gemini;
mod kind;
mod reader;
mod unit;

pub use claude::ClaudeReader;
pub use codex::CodexReader;
pub use cursor::CursorReader;
pub use error::SourceError;
pub use gemini::GeminiReader;
pub use kind::AgentKind;
pub use reader::{create_reader, SourceReader};
pub use unit::{
    field, from_epoch_millis, parse_timestamp, str_field, u64_field, ParsedTimestamp, RawUnit,
    ScanWindow, SourceScan,
};

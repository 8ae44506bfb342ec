//! Concrete collaborators for the dispatch core: the HTTP AI backend and the
//! presentation sinks.

pub mod console_sink;
pub mod http_ai_backend;
pub mod osascript_sink;

pub use console_sink::ConsoleSink;
pub use http_ai_backend::HttpAiBackend;
pub use osascript_sink::OsascriptSink;

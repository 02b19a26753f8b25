pub mod analyzer;
pub mod content_optimizer;
pub mod forum_search;
pub mod llm_service;
pub mod scripted;

pub use analyzer::{ContentSource, SpecAnalyzer};
pub use forum_search::ForumSearch;
pub use llm_service::LlmService;
pub use scripted::{ScriptedAnalyzer, ScriptedForum};

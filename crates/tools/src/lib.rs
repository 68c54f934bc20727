//! Plan parsing, placeholder substitution, and the three Tool Adapters
//! (Search, Code, LLM) that the Orchestrator dispatches against.

pub mod adapters;
pub mod plan_parser;
pub mod prompts;
pub mod substitution;

pub use adapters::{extract_answer, run_code, run_llm, run_search, ToolFailure, ToolSuccess};
pub use plan_parser::parse_plan;
pub use substitution::Bindings;

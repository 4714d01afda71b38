pub mod evaluation_call;
pub mod evaluation_ctx;

pub use evaluation_call::{build_user_prompt, evaluation_schema, EvaluationCall, Evaluator};
pub use evaluation_ctx::{EvaluationContext, DEFAULT_SYSTEM_PROMPT};

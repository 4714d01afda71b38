pub mod evaluation;
pub mod loaders;
pub mod submission;

pub use evaluation::{
    CriterionScore, EvaluationMode, EvaluationOutcome, ReportFormat, RunResult,
    StructuredEvaluation, StudentOutcome,
};
pub use loaders::{load_run_spec, RunSpec, SourceSpec};
pub use submission::{Submission, SubmissionFile};

//! CodeDrill practice-session engine
//!
//! Generates Java code with injected errors, checks that every error made it
//! in, and coaches a learner through reviewing it until the review is good
//! enough or the iteration budget runs out. External collaborators (the
//! error catalog and the language model) sit behind the traits in
//! [`services`].

pub mod api;
pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod extract;
pub mod generation;
pub mod handle;
pub mod persist;
pub mod report;
pub mod review;
pub mod services;
pub mod session;
pub mod validator;

pub use api::{create_router, AppState, ErrorResponse, ReportResponse, ReviewRequest};
pub use config::{Config, LlmSettings, DEFAULT_DOMAINS};
pub use decision::{GenerationDecision, ReviewDecision, SUFFICIENCY_THRESHOLD};
pub use engine::Engine;
pub use error::{DrillError, Result, ServiceError, ServiceErrorKind, ServiceResult};
pub use handle::{HandleSettings, SessionHandle, SessionRegistry};
pub use persist::{load_state, save_state};
pub use services::{
    AnalysisOutcome, CodeEvaluator, CodeGenerator, ErrorCatalog, EvaluationOutcome,
    GuidanceProvider, ReportWriter, ReviewAnalyzer, Services,
};
pub use session::{
    CodeLength, CodeSnippet, Difficulty, ErrorCountRange, ErrorSelection, ErrorSpec,
    EvaluationResult, GenerationParams, Phase, ReviewAnalysis, ReviewAttempt, SessionState,
};
pub use validator::{build_state, reconcile, SessionRequest};

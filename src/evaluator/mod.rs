//! Text evaluation service
//!
//! An external model scores candidates and reads the collective mood. The
//! `TextEvaluator` trait is the seam; `GeminiEvaluator` talks to the real
//! service and `MockEvaluator` stands in for it in tests.

pub mod analysis;
pub mod gemini;
pub mod mock;
pub mod traits;

pub use analysis::{
    evaluate_candidate, evaluate_mood, fallback_profile, mock_profile, CandidateInput, MoodReading,
};
pub use gemini::GeminiEvaluator;
pub use mock::MockEvaluator;
pub use traits::{strip_code_fences, EvaluationError, TextEvaluator};

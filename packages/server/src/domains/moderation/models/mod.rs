pub mod analysis;

pub use analysis::{AnalysisRecord, ModerationDecision, Verdict};

// src/scoring/mod.rs
//! Credibility scoring engine. Plain values in, plain values out: nothing in
//! here touches storage, the network or the clock.

pub mod blend;
pub mod community;
pub mod reputation;
pub mod signal;

pub use blend::{combine, weights_for, BlendWeights, CombinedResult};
pub use community::{community_score, VoteTally};
pub use reputation::{level_for_points, reputation_accuracy, reputation_weight, QUORUM};
pub use signal::{
    interpret_signal, is_too_short, ConfidenceThresholds, ConfidenceTier, PredictedClass,
    RawModelSignal, TrustLabel, TrustScore,
};

mod analysis;
mod feedback;
mod landmarks;
mod profile;

pub use analysis::{
    AnalysisResult, Background, ClutterLevel, Difficulty, Lighting, LightingQuality,
    SuggestedPose,
};
pub use feedback::{MatchStatus, PoseFeedback, MAX_ADJUSTMENTS};
pub use landmarks::{BodyPart, Point, PoseLandmarks, SKELETON_SEGMENTS};
pub use profile::{Gender, Style};

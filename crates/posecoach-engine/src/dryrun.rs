use anyhow::{bail, Result};
use image::{Rgba, RgbaImage};
use posecoach_contracts::pose::{
    AnalysisResult, Background, BodyPart, ClutterLevel, Difficulty, Gender, Lighting,
    LightingQuality, MatchStatus, PoseFeedback, PoseLandmarks, Style, SuggestedPose,
};
use sha2::{Digest, Sha256};

use crate::overlay::{draw_skeleton, encode_png};
use crate::PoseService;

const REFERENCE_WIDTH: u32 = 384;
const REFERENCE_HEIGHT: u32 = 512;

struct CannedPose {
    title: &'static str,
    description: &'static str,
    difficulty: Difficulty,
    steps: &'static [&'static str],
}

const POSES: &[CannedPose] = &[
    CannedPose {
        title: "Candid Lean",
        description: "Lean one shoulder against the wall and look just past the camera.",
        difficulty: Difficulty::Easy,
        steps: &[
            "Rest your left shoulder on the wall",
            "Cross your right ankle over",
            "Drop your chin slightly",
            "Glance past the lens",
        ],
    },
    CannedPose {
        title: "Power Stance",
        description: "Stand square to the camera with hands on hips and an open chest.",
        difficulty: Difficulty::Easy,
        steps: &[
            "Feet shoulder-width apart",
            "Hands on hips",
            "Roll your shoulders back",
        ],
    },
    CannedPose {
        title: "Over the Shoulder",
        description: "Turn away from the camera and look back over your shoulder.",
        difficulty: Difficulty::Medium,
        steps: &[
            "Turn your body to the side",
            "Twist from the waist toward the lens",
            "Lift your chin over your shoulder",
        ],
    },
    CannedPose {
        title: "Seated Reach",
        description: "Sit on the edge of a surface and reach one arm forward.",
        difficulty: Difficulty::Hard,
        steps: &[
            "Sit on the front edge",
            "Extend your right arm toward the camera",
            "Keep your back long",
            "Soften your fingers",
        ],
    },
];

const ADJUSTMENTS: &[&str] = &[
    "Chin up slightly",
    "Relax your shoulders",
    "Shift weight to back foot",
    "Soften your hands",
    "Turn hips toward camera",
    "Lengthen your neck",
];

/// Offline service. Every answer is a pure function of its inputs.
#[derive(Debug, Default)]
pub struct DryrunPoseService;

impl DryrunPoseService {
    pub fn new() -> Self {
        Self
    }
}

impl PoseService for DryrunPoseService {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn analyze_scene(&self, image: &[u8], gender: Gender, style: Style) -> Result<AnalysisResult> {
        if image.is_empty() {
            bail!("dryrun analyze received an empty frame");
        }
        let digest = digest_of(&[image, gender.label().as_bytes(), style.label().as_bytes()]);
        let pose = &POSES[usize::from(digest[0]) % POSES.len()];
        let quality = [
            LightingQuality::Excellent,
            LightingQuality::Good,
            LightingQuality::Fair,
            LightingQuality::Poor,
        ][usize::from(digest[1]) % 4];
        let clutter_level = [ClutterLevel::Clean, ClutterLevel::Moderate, ClutterLevel::Cluttered]
            [usize::from(digest[2]) % 3];

        Ok(AnalysisResult {
            environment: format!("Dryrun scene {}", hex::encode(&digest[..4])),
            lighting: Lighting {
                quality,
                direction: "Window light from the left".to_string(),
                suggestion: "Turn toward the window".to_string(),
            },
            background: Background {
                clutter_level,
                suggestion: "Step away from the shelves".to_string(),
            },
            suggested_pose: SuggestedPose {
                title: pose.title.to_string(),
                description: pose.description.to_string(),
                difficulty: pose.difficulty,
                steps: pose.steps.iter().map(|step| step.to_string()).collect(),
            },
        })
    }

    fn generate_reference(
        &self,
        pose_description: &str,
        gender: Gender,
        style: Style,
    ) -> Result<Vec<u8>> {
        let digest = digest_of(&[
            pose_description.as_bytes(),
            gender.label().as_bytes(),
            style.label().as_bytes(),
        ]);
        let backdrop = Rgba([
            160 + digest[0] % 64,
            160 + digest[1] % 64,
            160 + digest[2] % 64,
            255,
        ]);
        let mut image = RgbaImage::from_pixel(REFERENCE_WIDTH, REFERENCE_HEIGHT, backdrop);
        draw_skeleton(&mut image, &standing_figure(&digest), Rgba([40, 40, 40, 255]), 4);
        encode_png(&image)
    }

    fn evaluate_match(
        &self,
        image: &[u8],
        target_pose_description: &str,
    ) -> Result<PoseFeedback> {
        if image.is_empty() {
            bail!("dryrun grade received an empty frame");
        }
        let digest = digest_of(&[image, target_pose_description.as_bytes()]);
        let score = 40 + digest[0] % 61;
        let match_status = match score {
            90..=u8::MAX => MatchStatus::Perfect,
            70..=89 => MatchStatus::Good,
            _ => MatchStatus::NeedsImprovement,
        };
        let count = match match_status {
            MatchStatus::Perfect => 1,
            _ => 2 + usize::from(digest[1]) % 2,
        };
        let start = usize::from(digest[2]) % ADJUSTMENTS.len();
        let adjustments = (0..count)
            .map(|offset| ADJUSTMENTS[(start + offset) % ADJUSTMENTS.len()].to_string())
            .collect();
        Ok(PoseFeedback {
            score,
            match_status,
            adjustments,
        })
    }

    fn extract_landmarks(&self, image: &[u8]) -> Result<Option<PoseLandmarks>> {
        if image.is_empty() {
            return Ok(None);
        }
        Ok(Some(standing_figure(&digest_of(&[image]))))
    }
}

fn digest_of(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// A front-facing figure nudged by a few digest bytes.
fn standing_figure(digest: &[u8; 32]) -> PoseLandmarks {
    let sway = f32::from(digest[3] % 9) - 4.0;
    let reach = f32::from(digest[4] % 13);
    PoseLandmarks::new()
        .with_point(BodyPart::Nose, 50.0 + sway, 16.0)
        .with_point(BodyPart::LeftShoulder, 36.0 + sway, 30.0)
        .with_point(BodyPart::RightShoulder, 64.0 + sway, 30.0)
        .with_point(BodyPart::LeftElbow, 30.0, 45.0)
        .with_point(BodyPart::RightElbow, 70.0, 45.0 - reach)
        .with_point(BodyPart::LeftWrist, 28.0, 58.0)
        .with_point(BodyPart::RightWrist, 74.0, 58.0 - 2.0 * reach)
        .with_point(BodyPart::LeftHip, 42.0, 62.0)
        .with_point(BodyPart::RightHip, 58.0, 62.0)
}

//! Model categories and the kind of artifact each produces.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of generation categories. Adding one is an exhaustive-match change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelCategory {
    TextToImage,
    ImageToImage,
    TextToVideo,
    ImageToVideo,
    VideoToVideo,
    Avatar,
    MotionTransfer,
    Upscale,
    UpscaleVideo,
    AddAudio,
    TextToSpeech,
    SpeechToText,
    ImageUnderstanding,
    PromptGeneration,
}

impl ModelCategory {
    pub const ALL: [ModelCategory; 14] = [
        ModelCategory::TextToImage,
        ModelCategory::ImageToImage,
        ModelCategory::TextToVideo,
        ModelCategory::ImageToVideo,
        ModelCategory::VideoToVideo,
        ModelCategory::Avatar,
        ModelCategory::MotionTransfer,
        ModelCategory::Upscale,
        ModelCategory::UpscaleVideo,
        ModelCategory::AddAudio,
        ModelCategory::TextToSpeech,
        ModelCategory::SpeechToText,
        ModelCategory::ImageUnderstanding,
        ModelCategory::PromptGeneration,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelCategory::TextToImage => "text_to_image",
            ModelCategory::ImageToImage => "image_to_image",
            ModelCategory::TextToVideo => "text_to_video",
            ModelCategory::ImageToVideo => "image_to_video",
            ModelCategory::VideoToVideo => "video_to_video",
            ModelCategory::Avatar => "avatar",
            ModelCategory::MotionTransfer => "motion_transfer",
            ModelCategory::Upscale => "upscale",
            ModelCategory::UpscaleVideo => "upscale_video",
            ModelCategory::AddAudio => "add_audio",
            ModelCategory::TextToSpeech => "text_to_speech",
            ModelCategory::SpeechToText => "speech_to_text",
            ModelCategory::ImageUnderstanding => "image_understanding",
            ModelCategory::PromptGeneration => "prompt_generation",
        }
    }

    /// Kind of artifact a step of this category produces.
    pub fn output_kind(self) -> ArtifactKind {
        match self {
            ModelCategory::TextToImage | ModelCategory::ImageToImage | ModelCategory::Upscale => {
                ArtifactKind::Image
            }
            ModelCategory::TextToVideo
            | ModelCategory::ImageToVideo
            | ModelCategory::VideoToVideo
            | ModelCategory::Avatar
            | ModelCategory::MotionTransfer
            | ModelCategory::UpscaleVideo
            | ModelCategory::AddAudio => ArtifactKind::Video,
            ModelCategory::TextToSpeech => ArtifactKind::Audio,
            ModelCategory::SpeechToText
            | ModelCategory::ImageUnderstanding
            | ModelCategory::PromptGeneration => ArtifactKind::Text,
        }
    }
}

impl fmt::Display for ModelCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModelCategory::ALL
            .iter()
            .copied()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| format!("unknown category '{}'", s))
    }
}

/// What a step hands to later steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Image,
    Video,
    Audio,
    Text,
}

impl ArtifactKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactKind::Image => "image",
            ArtifactKind::Video => "video",
            ArtifactKind::Audio => "audio",
            ArtifactKind::Text => "text",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

use crate::error::GenerationError;
use crate::schema::job::JobKind;
use serde::{Deserialize, Serialize};

/// Motion descriptions longer than this are rejected by the provider.
pub const MAX_MOTION_TEXT_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Female,
    Male,
    Trans,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArtStyle {
    Realism,
    Anime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DetailLevel {
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VideoLength {
    Short,
    Medium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FrameRate {
    Low,
    Medium,
    High,
}

/// Structured appearance attributes for a character. All fields are optional;
/// `describe` renders whatever is set into the free-text appearance string
/// the provider expects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CharacterAppearance {
    pub gender: Option<Gender>,
    pub age: Option<u8>,
    pub ethnicity: Option<String>,
    pub hair_color: Option<String>,
    pub hair_style: Option<String>,
    pub eye_color: Option<String>,
    pub body_type: Option<String>,
    pub custom: Option<String>,
}

impl CharacterAppearance {
    /// Renders the set attributes in a fixed order so the same inputs always
    /// produce the same prompt text (reproducible alongside the seed).
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = Vec::new();

        if let Some(gender) = self.gender {
            let word = match gender {
                Gender::Female => "female",
                Gender::Male => "male",
                Gender::Trans => "trans",
            };
            parts.push(word.to_string());
        }
        if let Some(age) = self.age {
            parts.push(format!("{age} years old"));
        }
        if let Some(ethnicity) = trimmed(&self.ethnicity) {
            parts.push(ethnicity.to_string());
        }
        match (trimmed(&self.hair_style), trimmed(&self.hair_color)) {
            (Some(style), Some(color)) => parts.push(format!("{style} {color} hair")),
            (Some(style), None) => parts.push(format!("{style} hair")),
            (None, Some(color)) => parts.push(format!("{color} hair")),
            (None, None) => {}
        }
        if let Some(eyes) = trimmed(&self.eye_color) {
            parts.push(format!("{eyes} eyes"));
        }
        if let Some(body) = trimmed(&self.body_type) {
            parts.push(format!("{body} body"));
        }
        if let Some(custom) = trimmed(&self.custom) {
            parts.push(custom.to_string());
        }

        parts.join(", ")
    }
}

fn trimmed(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Parameters for a character image job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageParams {
    pub name: String,
    pub appearance: CharacterAppearance,
    pub style: ArtStyle,
    pub detail_level: DetailLevel,
    pub aspect_ratio: Option<String>,
    pub from_location: Option<String>,
    pub face_improve: bool,
    pub face_model: Option<String>,
    pub block_explicit: bool,
    pub seed: Option<i64>,
}

impl ImageParams {
    pub fn new(name: impl Into<String>, appearance: CharacterAppearance) -> Self {
        Self {
            name: name.into(),
            appearance,
            style: ArtStyle::Realism,
            detail_level: DetailLevel::Medium,
            aspect_ratio: None,
            from_location: None,
            face_improve: true,
            face_model: None,
            block_explicit: true,
            seed: None,
        }
    }
}

/// Parameters for animating an existing image into a short video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoParams {
    pub media_id: String,
    pub motion_text: String,
    pub video_length: VideoLength,
    pub frame_rate: FrameRate,
    pub seed: Option<i64>,
}

impl VideoParams {
    pub fn new(media_id: impl Into<String>, motion_text: impl Into<String>) -> Self {
        Self {
            media_id: media_id.into(),
            motion_text: motion_text.into(),
            video_length: VideoLength::Short,
            frame_rate: FrameRate::Medium,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GenerationParams {
    Image(ImageParams),
    Video(VideoParams),
}

impl GenerationParams {
    pub fn kind(&self) -> JobKind {
        match self {
            GenerationParams::Image(_) => JobKind::Image,
            GenerationParams::Video(_) => JobKind::Video,
        }
    }

    /// Input checks that must pass before any network call is made.
    pub fn validate(&self) -> Result<(), GenerationError> {
        match self {
            GenerationParams::Image(image) => {
                if image.name.trim().is_empty() {
                    return Err(GenerationError::Validation(
                        "character name is empty".to_string(),
                    ));
                }
                if image.appearance.describe().is_empty() {
                    return Err(GenerationError::Validation(
                        "appearance description is empty".to_string(),
                    ));
                }
            }
            GenerationParams::Video(video) => {
                if video.media_id.trim().is_empty() {
                    return Err(GenerationError::Validation(
                        "source media id is empty".to_string(),
                    ));
                }
                if video.motion_text.trim().is_empty() {
                    return Err(GenerationError::Validation(
                        "motion description is empty".to_string(),
                    ));
                }
                let len = video.motion_text.chars().count();
                if len > MAX_MOTION_TEXT_CHARS {
                    return Err(GenerationError::Validation(format!(
                        "motion description is {len} chars, max {MAX_MOTION_TEXT_CHARS}"
                    )));
                }
            }
        }
        Ok(())
    }
}

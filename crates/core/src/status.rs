//! Status state machines for pipeline entities.
//!
//! Statuses are stored as lowercase `snake_case` TEXT in the database
//! (enforced by CHECK constraints in the migrations) so the same enum
//! values round-trip through both the Postgres and in-memory stores.

use serde::{Deserialize, Serialize};

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $text:expr ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Database/text representation of this status.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( Self::$variant => $text ),+
                }
            }

            /// Parse the database/text representation.
            pub fn parse(s: &str) -> Option<Self> {
                match s {
                    $( $text => Some(Self::$variant), )+
                    _ => None,
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

define_status_enum! {
    /// Project lifecycle status.
    ///
    /// `Failed` is an absorbing state reachable from any stage.
    ProjectStatus {
        Draft = "draft",
        DocumentUploaded = "document_uploaded",
        ScriptGenerated = "script_generated",
        ScenesProcessed = "scenes_processed",
        Rendering = "rendering",
        Rendered = "rendered",
        Failed = "failed",
    }
}

define_status_enum! {
    /// Per-scene stage status (TTS, avatar, background) and the
    /// project-level avatar-design status.
    StageStatus {
        Pending = "pending",
        Generating = "generating",
        Completed = "completed",
        Failed = "failed",
    }
}

define_status_enum! {
    /// Status of one external long-running render operation.
    RenderJobStatus {
        Processing = "processing",
        Completed = "completed",
        Failed = "failed",
    }
}

define_status_enum! {
    /// Which avatar the project uses for its talking-head renders.
    AvatarMode {
        Preset = "preset",
        Custom = "custom",
    }
}

define_status_enum! {
    /// Background-generation strategy classification for a scene.
    ///
    /// - `Low` -- static placeholder, no external call.
    /// - `Medium` -- synchronous image generation.
    /// - `High` -- image generation chained into an image-to-video render.
    BackgroundPriority {
        Low = "low",
        Medium = "medium",
        High = "high",
    }
}

define_status_enum! {
    /// Kind tag for generated artifacts.
    AssetKind {
        Audio = "audio",
        AvatarVideo = "avatar_video",
        AvatarPortrait = "avatar_portrait",
        BackgroundImage = "background_image",
        BackgroundVideo = "background_video",
        FinalVideo = "final_video",
    }
}

/// The three per-scene stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Tts,
    Avatar,
    Background,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Tts => "tts",
            Self::Avatar => "avatar",
            Self::Background => "background",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            ProjectStatus::Draft,
            ProjectStatus::DocumentUploaded,
            ProjectStatus::ScriptGenerated,
            ProjectStatus::ScenesProcessed,
            ProjectStatus::Rendering,
            ProjectStatus::Rendered,
            ProjectStatus::Failed,
        ] {
            assert_eq!(ProjectStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn stage_status_round_trips() {
        for status in [
            StageStatus::Pending,
            StageStatus::Generating,
            StageStatus::Completed,
            StageStatus::Failed,
        ] {
            assert_eq!(StageStatus::parse(status.as_str()), Some(status));
        }
    }

    #[test]
    fn unknown_status_text_rejected() {
        assert_eq!(ProjectStatus::parse("exploded"), None);
        assert_eq!(StageStatus::parse(""), None);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ProjectStatus::ScenesProcessed).unwrap();
        assert_eq!(json, "\"scenes_processed\"");
    }
}

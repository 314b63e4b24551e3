//! Composition readiness gating and manifest assembly.
//!
//! Before a project can be handed to the offline render step, every scene
//! must have completed all three stages. The gate produces an itemized
//! error naming each incomplete scene rather than failing on the first.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::planning::SCENE_DURATION_SECS;
use crate::status::{Stage, StageStatus};
use crate::types::DbId;

/// The per-scene view the composition gate inspects.
///
/// The pipeline maps its persisted Scene rows into this shape so the gate
/// stays free of storage concerns.
#[derive(Debug, Clone)]
pub struct SceneReadiness {
    pub scene_id: DbId,
    /// 0-based position within the project.
    pub position: u32,
    pub tts: StageStatus,
    pub avatar: StageStatus,
    pub background: StageStatus,
    pub audio_url: Option<String>,
    pub avatar_url: Option<String>,
    pub background_url: Option<String>,
}

impl SceneReadiness {
    /// Stages that are not yet `completed`, in pipeline order.
    fn incomplete_stages(&self) -> Vec<(Stage, StageStatus)> {
        [
            (Stage::Tts, self.tts),
            (Stage::Avatar, self.avatar),
            (Stage::Background, self.background),
        ]
        .into_iter()
        .filter(|(_, status)| *status != StageStatus::Completed)
        .collect()
    }
}

/// One entry of the composition manifest, in scene-position order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ManifestEntry {
    pub scene_id: DbId,
    pub position: u32,
    pub duration_secs: u32,
    pub audio_url: String,
    pub avatar_url: String,
    pub background_url: String,
}

/// Ordered list of per-scene artifacts for the offline render step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
    pub total_duration_secs: u32,
}

/// Verify every scene completed every stage, then assemble the manifest.
///
/// Fails with a descriptive list of all incomplete scenes, or when a
/// completed scene is missing an artifact URL (which would indicate a
/// stage workflow bug, not a user error).
pub fn build_manifest(scenes: &[SceneReadiness]) -> Result<Manifest, CoreError> {
    if scenes.is_empty() {
        return Err(CoreError::Precondition(
            "Project has no scenes to compose".to_string(),
        ));
    }

    let mut incomplete = Vec::new();
    for scene in scenes {
        for (stage, status) in scene.incomplete_stages() {
            incomplete.push(format!(
                "scene {} (id {}): {stage} is {status}",
                scene.position + 1,
                scene.scene_id
            ));
        }
    }
    if !incomplete.is_empty() {
        return Err(CoreError::Precondition(format!(
            "Cannot compose -- {} stage(s) incomplete: {}",
            incomplete.len(),
            incomplete.join("; ")
        )));
    }

    let mut ordered: Vec<&SceneReadiness> = scenes.iter().collect();
    ordered.sort_by_key(|s| s.position);

    let mut entries = Vec::with_capacity(ordered.len());
    for scene in ordered {
        let entry = ManifestEntry {
            scene_id: scene.scene_id,
            position: scene.position,
            duration_secs: SCENE_DURATION_SECS,
            audio_url: require_url(scene, "audio", &scene.audio_url)?,
            avatar_url: require_url(scene, "avatar", &scene.avatar_url)?,
            background_url: require_url(scene, "background", &scene.background_url)?,
        };
        entries.push(entry);
    }

    let total_duration_secs = entries.iter().map(|e| e.duration_secs).sum();
    Ok(Manifest {
        entries,
        total_duration_secs,
    })
}

fn require_url(
    scene: &SceneReadiness,
    artifact: &str,
    url: &Option<String>,
) -> Result<String, CoreError> {
    url.clone().ok_or_else(|| {
        CoreError::Internal(format!(
            "Scene {} is marked completed but has no {artifact} artifact URL",
            scene.scene_id
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_scene(scene_id: DbId, position: u32) -> SceneReadiness {
        SceneReadiness {
            scene_id,
            position,
            tts: StageStatus::Completed,
            avatar: StageStatus::Completed,
            background: StageStatus::Completed,
            audio_url: Some(format!("s3://bucket/{scene_id}/audio.mp3")),
            avatar_url: Some(format!("s3://bucket/{scene_id}/avatar.mp4")),
            background_url: Some(format!("s3://bucket/{scene_id}/bg.mp4")),
        }
    }

    #[test]
    fn all_completed_builds_ordered_manifest() {
        // Deliberately out of order to verify sorting.
        let scenes = vec![
            ready_scene(12, 2),
            ready_scene(10, 0),
            ready_scene(13, 3),
            ready_scene(11, 1),
            ready_scene(14, 4),
        ];
        let manifest = build_manifest(&scenes).unwrap();
        assert_eq!(manifest.entries.len(), 5);
        let positions: Vec<u32> = manifest.entries.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3, 4]);
        assert_eq!(manifest.total_duration_secs, 5 * SCENE_DURATION_SECS);
    }

    #[test]
    fn incomplete_scene_named_in_error() {
        let mut scenes: Vec<SceneReadiness> = (0..5).map(|i| ready_scene(10 + i, i as u32)).collect();
        scenes[3].background = StageStatus::Generating;

        let err = build_manifest(&scenes).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("scene 4"), "message was: {msg}");
        assert!(msg.contains("background is generating"), "message was: {msg}");
    }

    #[test]
    fn multiple_incomplete_scenes_all_listed() {
        let mut scenes: Vec<SceneReadiness> = (0..3).map(|i| ready_scene(i, i as u32)).collect();
        scenes[0].tts = StageStatus::Failed;
        scenes[2].avatar = StageStatus::Pending;

        let err = build_manifest(&scenes).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("scene 1"), "message was: {msg}");
        assert!(msg.contains("scene 3"), "message was: {msg}");
    }

    #[test]
    fn empty_project_rejected() {
        assert!(build_manifest(&[]).is_err());
    }

    #[test]
    fn missing_artifact_url_is_internal_error() {
        let mut scene = ready_scene(1, 0);
        scene.avatar_url = None;
        let err = build_manifest(&[scene]).unwrap_err();
        assert!(matches!(err, CoreError::Internal(_)));
    }
}

//! Storing provider artifacts as blobs + Asset rows.
//!
//! `file_path` on the Asset row is the publicly addressable URL of the
//! stored object; `source_url` keeps the provider-side origin when the
//! artifact was handed to us as a reference rather than bytes.

use docureel_core::status::AssetKind;
use docureel_core::types::DbId;
use docureel_db::models::asset::CreateAsset;
use docureel_providers::{AudioArtifact, ImageArtifact, VideoArtifact, VideoSource};
use docureel_storage::{asset_key, content_hash};
use serde::{Deserialize, Serialize};

use crate::deps::PipelineDeps;

/// What a stage workflow records after storing an artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAsset {
    pub asset_id: DbId,
    pub url: String,
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "audio/mpeg" => "mp3",
        "audio/wav" => "wav",
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/svg+xml" => "svg",
        "video/mp4" => "mp4",
        _ => "bin",
    }
}

async fn store_bytes(
    deps: &PipelineDeps,
    project_id: DbId,
    scene_id: Option<DbId>,
    kind: AssetKind,
    bytes: Vec<u8>,
    content_type: &str,
    provider: Option<&str>,
    provider_job_id: Option<&str>,
) -> anyhow::Result<StoredAsset> {
    let hash = content_hash(&bytes);
    let key = match scene_id {
        Some(scene_id) => asset_key(
            project_id,
            scene_id,
            kind.as_str(),
            &hash,
            extension_for(content_type),
        ),
        None => docureel_storage::project_key(
            project_id,
            kind.as_str(),
            &hash,
            extension_for(content_type),
        ),
    };
    let blob = deps.blobs.put(&key, bytes, content_type).await?;

    let asset = deps
        .store
        .create_asset(&CreateAsset {
            project_id,
            scene_id,
            kind: kind.as_str().to_string(),
            file_path: blob.url.clone(),
            source_url: None,
            provider: provider.map(str::to_string),
            provider_job_id: provider_job_id.map(str::to_string),
            cost_cents: None,
            content_sha256: Some(blob.content_hash),
        })
        .await?;

    Ok(StoredAsset {
        asset_id: asset.id,
        url: blob.url,
    })
}

pub(crate) async fn store_audio(
    deps: &PipelineDeps,
    project_id: DbId,
    scene_id: DbId,
    audio: AudioArtifact,
    provider: &str,
) -> anyhow::Result<StoredAsset> {
    store_bytes(
        deps,
        project_id,
        Some(scene_id),
        AssetKind::Audio,
        audio.bytes,
        &audio.content_type,
        Some(provider),
        None,
    )
    .await
}

pub(crate) async fn store_image(
    deps: &PipelineDeps,
    project_id: DbId,
    scene_id: Option<DbId>,
    kind: AssetKind,
    image: ImageArtifact,
    provider: &str,
) -> anyhow::Result<StoredAsset> {
    store_bytes(
        deps,
        project_id,
        scene_id,
        kind,
        image.bytes,
        &image.content_type,
        Some(provider),
        None,
    )
    .await
}

/// Videos arrive either as inline bytes (uploaded to the blob store) or
/// as a provider storage reference (recorded as-is).
pub(crate) async fn store_video(
    deps: &PipelineDeps,
    project_id: DbId,
    scene_id: DbId,
    kind: AssetKind,
    video: VideoArtifact,
    provider: &str,
    provider_job_id: Option<&str>,
) -> anyhow::Result<StoredAsset> {
    match video.source {
        VideoSource::Inline { bytes } => {
            store_bytes(
                deps,
                project_id,
                Some(scene_id),
                kind,
                bytes,
                &video.content_type,
                Some(provider),
                provider_job_id,
            )
            .await
        }
        VideoSource::Url { url } => {
            let asset = deps
                .store
                .create_asset(&CreateAsset {
                    project_id,
                    scene_id: Some(scene_id),
                    kind: kind.as_str().to_string(),
                    file_path: url.clone(),
                    source_url: Some(url.clone()),
                    provider: Some(provider.to_string()),
                    provider_job_id: provider_job_id.map(str::to_string),
                    cost_cents: None,
                    content_sha256: None,
                })
                .await?;
            Ok(StoredAsset {
                asset_id: asset.id,
                url,
            })
        }
    }
}

//! End-to-end pipeline tests on the in-memory stores.
//!
//! Fake providers record a call timeline so stage ordering can be
//! asserted, not just final state. All suspension points that wait on
//! wall-clock time use zero durations; event waits use the (long)
//! defaults and are satisfied by published events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use docureel_core::status::StageStatus;
use docureel_engine::memory::MemRunStore;
use docureel_engine::{EventRouter, RunStore, Scheduler, WorkflowRegistry};
use docureel_events::{names, EventBus, PipelineEvent};
use docureel_pipeline::{
    register_workflows, AvatarDesignPayload, MemStore, PipelineConfig, PipelineDeps,
    PollPayload, ProjectPayload, ScenePayload, ScriptGenPayload, Store,
};
use docureel_providers::{
    AudioArtifact, AvatarRenderer, AvatarRequest, ImageArtifact, ImageGenerator,
    ImageRequest, JobHandle, PollStatus, ProviderError, SceneScript, ScriptGenerator,
    ScriptRequest, SpeechSynthesizer, Submission, TtsRequest, VideoArtifact, VideoGenerator,
    VideoRequest, VideoSource,
};
use docureel_storage::MemBlobStore;

type Timeline = Arc<Mutex<Vec<String>>>;

fn push(timeline: &Timeline, entry: impl Into<String>) {
    timeline.lock().unwrap().push(entry.into());
}

const SUMMARY: &str = "Condensed narration of the source document.";
const PRESET_AVATAR: &str = "https://portraits.example/preset.png";

// ---------------------------------------------------------------------------
// Fake providers
// ---------------------------------------------------------------------------

struct FakeScripts {
    timeline: Timeline,
    canned: Option<Vec<String>>,
}

#[async_trait::async_trait]
impl ScriptGenerator for FakeScripts {
    async fn generate(
        &self,
        request: &ScriptRequest,
    ) -> Result<Vec<SceneScript>, ProviderError> {
        push(&self.timeline, "script:generate");
        let scripts = match &self.canned {
            Some(list) => list.clone(),
            None => (0..request.scene_count)
                .map(|i| format!("Narration for segment {i} of the source document."))
                .collect(),
        };
        Ok(scripts
            .into_iter()
            .enumerate()
            .map(|(i, script)| SceneScript {
                position: i as u32,
                script,
            })
            .collect())
    }

    async fn summarize(
        &self,
        _script: &str,
        _max_chars: usize,
    ) -> Result<String, ProviderError> {
        push(&self.timeline, "script:summarize");
        Ok(SUMMARY.to_string())
    }
}

struct FakeTts {
    timeline: Timeline,
}

#[async_trait::async_trait]
impl SpeechSynthesizer for FakeTts {
    async fn synthesize(&self, _request: &TtsRequest) -> Result<AudioArtifact, ProviderError> {
        push(&self.timeline, "tts");
        Ok(AudioArtifact {
            bytes: b"fake-mp3-bytes".to_vec(),
            content_type: "audio/mpeg".to_string(),
            duration_secs: 8.0,
        })
    }
}

/// Whether a fake render completes inline or through the polling loop.
#[derive(Clone, Copy)]
enum RenderMode {
    Sync,
    /// The render reports done on the `until_done`-th poll.
    Poll { until_done: usize },
}

fn url_video(id: &str) -> VideoArtifact {
    VideoArtifact {
        source: VideoSource::Url {
            url: format!("https://renders.example/{id}.mp4"),
        },
        content_type: "video/mp4".to_string(),
    }
}

struct FakeAvatars {
    timeline: Timeline,
    mode: RenderMode,
    next_id: AtomicUsize,
    polls: Mutex<HashMap<String, usize>>,
    portraits: Mutex<Vec<String>>,
}

impl FakeAvatars {
    fn new(timeline: Timeline, mode: RenderMode) -> Self {
        Self {
            timeline,
            mode,
            next_id: AtomicUsize::new(0),
            polls: Mutex::new(HashMap::new()),
            portraits: Mutex::new(Vec::new()),
        }
    }

    fn portraits(&self) -> Vec<String> {
        self.portraits.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl AvatarRenderer for FakeAvatars {
    async fn submit(
        &self,
        request: &AvatarRequest,
    ) -> Result<Submission<VideoArtifact>, ProviderError> {
        let portrait = if request.portrait_url == PRESET_AVATAR {
            "preset"
        } else {
            "custom"
        };
        self.portraits
            .lock()
            .unwrap()
            .push(request.portrait_url.clone());
        push(&self.timeline, format!("avatar:submit:{portrait}"));
        match self.mode {
            RenderMode::Sync => Ok(Submission::Completed(url_video("avatar-sync"))),
            RenderMode::Poll { .. } => {
                let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(Submission::Accepted(JobHandle::new(format!("avatar-{n}"))))
            }
        }
    }

    async fn poll(
        &self,
        handle: &JobHandle,
    ) -> Result<PollStatus<VideoArtifact>, ProviderError> {
        push(&self.timeline, "avatar:poll");
        let RenderMode::Poll { until_done } = self.mode else {
            return Err(ProviderError::permanent("no render job to poll"));
        };
        let mut polls = self.polls.lock().unwrap();
        let count = polls.entry(handle.external_id.clone()).or_insert(0);
        *count += 1;
        if *count >= until_done {
            Ok(PollStatus::Completed(url_video(&handle.external_id)))
        } else {
            Ok(PollStatus::Pending)
        }
    }
}

struct FakeImages {
    timeline: Timeline,
    quota_exhausted: bool,
}

#[async_trait::async_trait]
impl ImageGenerator for FakeImages {
    async fn generate(&self, _request: &ImageRequest) -> Result<ImageArtifact, ProviderError> {
        push(&self.timeline, "image");
        if self.quota_exhausted {
            return Err(ProviderError::quota_exceeded("image quota exhausted"));
        }
        Ok(ImageArtifact {
            bytes: vec![0x89, b'P', b'N', b'G'],
            content_type: "image/png".to_string(),
        })
    }
}

struct FakeVideos {
    timeline: Timeline,
    mode: RenderMode,
    next_id: AtomicUsize,
    polls: Mutex<HashMap<String, usize>>,
}

impl FakeVideos {
    fn new(timeline: Timeline, mode: RenderMode) -> Self {
        Self {
            timeline,
            mode,
            next_id: AtomicUsize::new(0),
            polls: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait::async_trait]
impl VideoGenerator for FakeVideos {
    async fn submit(
        &self,
        _request: &VideoRequest,
    ) -> Result<Submission<VideoArtifact>, ProviderError> {
        push(&self.timeline, "video:submit");
        match self.mode {
            RenderMode::Sync => Ok(Submission::Completed(VideoArtifact {
                source: VideoSource::Inline {
                    bytes: vec![1, 2, 3, 4],
                },
                content_type: "video/mp4".to_string(),
            })),
            RenderMode::Poll { .. } => {
                let n = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(Submission::Accepted(JobHandle::new(format!("video-{n}"))))
            }
        }
    }

    async fn poll(
        &self,
        handle: &JobHandle,
    ) -> Result<PollStatus<VideoArtifact>, ProviderError> {
        push(&self.timeline, "video:poll");
        let RenderMode::Poll { until_done } = self.mode else {
            return Err(ProviderError::permanent("no operation to poll"));
        };
        let mut polls = self.polls.lock().unwrap();
        let count = polls.entry(handle.external_id.clone()).or_insert(0);
        *count += 1;
        if *count >= until_done {
            Ok(PollStatus::Completed(url_video(&handle.external_id)))
        } else {
            Ok(PollStatus::Pending)
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Setup {
    avatars: RenderMode,
    videos: RenderMode,
    images_quota_exhausted: bool,
    canned_scripts: Option<Vec<String>>,
}

impl Default for Setup {
    fn default() -> Self {
        Self {
            avatars: RenderMode::Sync,
            videos: RenderMode::Sync,
            images_quota_exhausted: false,
            canned_scripts: None,
        }
    }
}

struct Harness {
    store: Arc<MemStore>,
    router: Arc<EventRouter>,
    scheduler: Scheduler,
    timeline: Timeline,
    avatars: Arc<FakeAvatars>,
}

/// Zero wall-clock pauses; event waits keep their (long) defaults and are
/// satisfied by published events, never by elapsed time.
fn test_config() -> PipelineConfig {
    PipelineConfig {
        rate_limit_pause: Duration::ZERO,
        poll_interval: Duration::ZERO,
        preset_avatar_url: PRESET_AVATAR.to_string(),
        ..PipelineConfig::default()
    }
}

fn harness(config: PipelineConfig, setup: Setup) -> Harness {
    let timeline: Timeline = Arc::new(Mutex::new(Vec::new()));
    let store = Arc::new(MemStore::new());
    let avatars = Arc::new(FakeAvatars::new(timeline.clone(), setup.avatars));

    let deps = Arc::new(PipelineDeps {
        store: store.clone(),
        blobs: Arc::new(MemBlobStore::new()),
        scripts: Arc::new(FakeScripts {
            timeline: timeline.clone(),
            canned: setup.canned_scripts,
        }),
        tts: Arc::new(FakeTts {
            timeline: timeline.clone(),
        }),
        avatars: avatars.clone(),
        images: Arc::new(FakeImages {
            timeline: timeline.clone(),
            quota_exhausted: setup.images_quota_exhausted,
        }),
        videos: Arc::new(FakeVideos::new(timeline.clone(), setup.videos)),
        config,
    });

    let runs: Arc<MemRunStore> = Arc::new(MemRunStore::new());
    let registry = Arc::new(register_workflows(WorkflowRegistry::new(), deps));
    let router = Arc::new(EventRouter::new(
        runs.clone() as Arc<dyn RunStore>,
        registry.clone(),
        Arc::new(EventBus::default()),
    ));
    let scheduler = Scheduler::new(runs as Arc<dyn RunStore>, registry, router.clone());

    Harness {
        store,
        router,
        scheduler,
        timeline,
        avatars,
    }
}

fn timeline_of(h: &Harness) -> Vec<String> {
    h.timeline.lock().unwrap().clone()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn document_to_manifest_with_long_running_renders() {
    let h = harness(
        test_config(),
        Setup {
            avatars: RenderMode::Poll { until_done: 2 },
            videos: RenderMode::Poll { until_done: 2 },
            ..Setup::default()
        },
    );
    let project = h.store.seed_project("Cell Biology", 30, "preset").await;
    let document = h
        .store
        .seed_document(project.id, "Mitochondria produce ATP through respiration.")
        .await;

    h.router
        .publish(
            PipelineEvent::new(names::SCRIPT_GENERATION_REQUESTED)
                .for_project(project.id)
                .with_payload(
                    serde_json::to_value(ScriptGenPayload {
                        project_id: project.id,
                        document_id: document.id,
                    })
                    .unwrap(),
                ),
        )
        .await
        .unwrap();
    h.scheduler.run_until_idle().await.unwrap();

    // 30 seconds of 8-second scenes: 4 scenes, processed strictly in
    // sequence, each driven TTS -> avatar -> background.
    let scenes = h.store.list_scenes(project.id).await.unwrap();
    assert_eq!(scenes.len(), 4);
    for scene in &scenes {
        assert_eq!(scene.tts_status(), Some(StageStatus::Completed));
        assert_eq!(scene.avatar_status(), Some(StageStatus::Completed));
        assert_eq!(scene.background_status(), Some(StageStatus::Completed));
        assert!(scene.audio_asset_id.is_some());
        assert!(scene.avatar_asset_id.is_some());
        assert!(scene.background_asset_id.is_some());
    }

    let per_scene = [
        "tts",
        "avatar:submit:preset",
        "avatar:poll",
        "avatar:poll",
        "image",
        "video:submit",
        "video:poll",
        "video:poll",
    ];
    let mut expected = vec!["script:generate".to_string()];
    for _ in 0..4 {
        expected.extend(per_scene.iter().map(|s| s.to_string()));
    }
    assert_eq!(timeline_of(&h), expected);

    let jobs = h.store.render_jobs().await;
    assert_eq!(jobs.len(), 8);
    for job in &jobs {
        assert_eq!(job.status, "completed");
        assert_eq!(job.attempts, 2);
    }

    let project = h.store.find_project(project.id).await.unwrap().unwrap();
    assert_eq!(project.status, "scenes_processed");
    let manifest = project.manifest.expect("manifest persisted");
    assert_eq!(manifest["entries"].as_array().unwrap().len(), 4);
    assert_eq!(manifest["total_duration_secs"], 32);
    for entry in manifest["entries"].as_array().unwrap() {
        assert!(entry["audio_url"].as_str().unwrap().starts_with("memory://"));
        assert!(entry["avatar_url"]
            .as_str()
            .unwrap()
            .starts_with("https://renders.example/avatar-"));
        assert!(entry["background_url"]
            .as_str()
            .unwrap()
            .starts_with("https://renders.example/video-"));
    }
}

#[tokio::test]
async fn polling_gives_up_after_the_attempt_budget() {
    let h = harness(
        test_config(),
        Setup {
            avatars: RenderMode::Poll {
                until_done: usize::MAX,
            },
            ..Setup::default()
        },
    );
    let project = h.store.seed_project("Stuck Render", 30, "preset").await;
    let scene = h
        .store
        .seed_scene(project.id, 0, "Enzymes lower activation energy.", "high")
        .await;
    h.store
        .create_render_job("avatar-stuck", "avatar", project.id, Some(scene.id), "avatar_video")
        .await
        .unwrap();

    h.router
        .publish(
            PipelineEvent::new(names::AVATAR_POLLING_REQUESTED)
                .for_project(project.id)
                .for_scene(scene.id)
                .with_payload(
                    serde_json::to_value(PollPayload {
                        project_id: project.id,
                        scene_id: scene.id,
                        external_job_id: "avatar-stuck".to_string(),
                        attempt: 0,
                        max_attempts: 3,
                    })
                    .unwrap(),
                ),
        )
        .await
        .unwrap();
    h.scheduler.run_until_idle().await.unwrap();

    // Exactly max_attempts provider polls, then the job and stage fail.
    let polls = timeline_of(&h)
        .iter()
        .filter(|e| e.as_str() == "avatar:poll")
        .count();
    assert_eq!(polls, 3);

    let job = h
        .store
        .find_render_job("avatar-stuck")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status, "failed");
    assert_eq!(job.attempts, 3);
    assert!(job
        .error_message
        .unwrap()
        .contains("still pending after 3 polls"));

    let scene = h.store.find_scene(scene.id).await.unwrap().unwrap();
    assert_eq!(scene.avatar_status(), Some(StageStatus::Failed));
}

#[tokio::test]
async fn avatar_design_quota_failure_falls_back_and_unblocks_the_scene() {
    let h = harness(
        test_config(),
        Setup {
            images_quota_exhausted: true,
            ..Setup::default()
        },
    );
    let project = h.store.seed_project("Custom Avatar", 30, "custom").await;
    let scene = h
        .store
        .seed_scene(project.id, 0, "Cells store energy as ATP.", "low")
        .await;

    // The orchestrator parks on the design gate first.
    h.router
        .publish(
            PipelineEvent::new(names::SCENE_PROCESS_REQUESTED)
                .for_project(project.id)
                .for_scene(scene.id)
                .with_payload(
                    serde_json::to_value(ScenePayload {
                        project_id: project.id,
                        scene_id: scene.id,
                    })
                    .unwrap(),
                ),
        )
        .await
        .unwrap();
    h.scheduler.run_until_idle().await.unwrap();
    assert_eq!(timeline_of(&h), Vec::<String>::new());

    h.router
        .publish(
            PipelineEvent::new(names::AVATAR_DESIGN_GENERATION_REQUESTED)
                .for_project(project.id)
                .with_payload(
                    serde_json::to_value(AvatarDesignPayload {
                        project_id: project.id,
                        prompt: None,
                    })
                    .unwrap(),
                ),
        )
        .await
        .unwrap();
    h.scheduler.run_until_idle().await.unwrap();

    // Quota exhaustion flags the fallback and still emits the completion
    // event, so the scene proceeds immediately with the preset avatar.
    let project = h.store.find_project(project.id).await.unwrap().unwrap();
    assert!(project.avatar_design_fallback);
    assert_eq!(project.avatar_design_status, "failed");
    assert_eq!(project.status, "scenes_processed");
    assert!(timeline_of(&h).contains(&"avatar:submit:preset".to_string()));

    let scene = h.store.find_scene(scene.id).await.unwrap().unwrap();
    assert_eq!(scene.background_status(), Some(StageStatus::Completed));

    // Exactly one image call (the failed design attempt); the low
    // priority background is a static placeholder, not a generation.
    let image_calls = timeline_of(&h)
        .iter()
        .filter(|e| e.as_str() == "image")
        .count();
    assert_eq!(image_calls, 1);
    let background = h
        .store
        .find_asset(scene.background_asset_id.unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(background.kind, "background_image");
    assert!(background.file_path.starts_with("memory://"));
}

#[tokio::test]
async fn design_gate_timeout_proceeds_with_the_preset_avatar() {
    let config = PipelineConfig {
        avatar_design_wait: Duration::ZERO,
        ..test_config()
    };
    let h = harness(config, Setup::default());
    let project = h.store.seed_project("Slow Designer", 30, "custom").await;
    let scene = h
        .store
        .seed_scene(project.id, 0, "Osmosis moves water across membranes.", "low")
        .await;

    h.router
        .publish(
            PipelineEvent::new(names::SCENE_PROCESS_REQUESTED)
                .for_project(project.id)
                .for_scene(scene.id)
                .with_payload(
                    serde_json::to_value(ScenePayload {
                        project_id: project.id,
                        scene_id: scene.id,
                    })
                    .unwrap(),
                ),
        )
        .await
        .unwrap();
    h.scheduler.run_until_idle().await.unwrap();

    let project = h.store.find_project(project.id).await.unwrap().unwrap();
    assert_eq!(project.status, "scenes_processed");
    // Design never ran; the render went out with the preset avatar.
    assert_eq!(project.avatar_design_status, "pending");
    assert!(timeline_of(&h).contains(&"avatar:submit:preset".to_string()));
    assert_eq!(h.avatars.portraits(), vec![PRESET_AVATAR.to_string()]);
}

#[tokio::test]
async fn poll_after_webhook_completion_stores_nothing_new() {
    use docureel_core::status::Stage;
    use docureel_db::models::asset::CreateAsset;

    let h = harness(
        test_config(),
        Setup {
            avatars: RenderMode::Poll { until_done: 1 },
            ..Setup::default()
        },
    );
    let project = h.store.seed_project("Race", 30, "preset").await;
    let scene = h
        .store
        .seed_scene(project.id, 0, "Lysosomes recycle cellular waste.", "low")
        .await;
    h.store
        .create_render_job("avatar-done", "avatar", project.id, Some(scene.id), "avatar_video")
        .await
        .unwrap();

    // The provider webhook lands first: it stores the artifact and moves
    // the job and the stage to their terminal states.
    let webhook_asset = h
        .store
        .create_asset(&CreateAsset {
            project_id: project.id,
            scene_id: Some(scene.id),
            kind: "avatar_video".to_string(),
            file_path: "https://renders.example/avatar-done.mp4".to_string(),
            source_url: Some("https://renders.example/avatar-done.mp4".to_string()),
            provider: Some("avatar".to_string()),
            provider_job_id: Some("avatar-done".to_string()),
            cost_cents: None,
            content_sha256: None,
        })
        .await
        .unwrap();
    assert!(h.store.complete_render_job("avatar-done").await.unwrap());
    assert!(h
        .store
        .complete_stage(scene.id, Stage::Avatar, webhook_asset.id)
        .await
        .unwrap());

    // A poll tick that was already in flight now observes the finished
    // render.
    h.router
        .publish(
            PipelineEvent::new(names::AVATAR_POLLING_REQUESTED)
                .for_project(project.id)
                .for_scene(scene.id)
                .with_payload(
                    serde_json::to_value(PollPayload {
                        project_id: project.id,
                        scene_id: scene.id,
                        external_job_id: "avatar-done".to_string(),
                        attempt: 0,
                        max_attempts: 3,
                    })
                    .unwrap(),
                ),
        )
        .await
        .unwrap();
    h.scheduler.run_until_idle().await.unwrap();

    // The losing tick polls once and backs off: no second asset, and the
    // webhook's artifact stays linked to the scene.
    assert_eq!(timeline_of(&h), vec!["avatar:poll".to_string()]);
    let assets = h.store.assets().await;
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].id, webhook_asset.id);

    let scene = h.store.find_scene(scene.id).await.unwrap().unwrap();
    assert_eq!(scene.avatar_status(), Some(StageStatus::Completed));
    assert_eq!(scene.avatar_asset_id, Some(webhook_asset.id));

    let job = h.store.find_render_job("avatar-done").await.unwrap().unwrap();
    assert_eq!(job.status, "completed");
    assert_eq!(job.attempts, 1);
}

#[tokio::test]
async fn composition_rejects_a_project_with_incomplete_scenes() {
    use docureel_core::status::Stage;

    let h = harness(test_config(), Setup::default());
    let project = h.store.seed_project("Not Ready", 60, "preset").await;
    let mut scene_ids = Vec::new();
    for position in 0..5 {
        let scene = h
            .store
            .seed_scene(project.id, position, "Ribosomes assemble proteins.", "high")
            .await;
        scene_ids.push(scene.id);
    }
    for (index, scene_id) in scene_ids.iter().enumerate() {
        h.store
            .force_stage_status(*scene_id, Stage::Tts, StageStatus::Completed)
            .await;
        h.store
            .force_stage_status(*scene_id, Stage::Avatar, StageStatus::Completed)
            .await;
        let background = if index == 3 {
            StageStatus::Generating
        } else {
            StageStatus::Completed
        };
        h.store
            .force_stage_status(*scene_id, Stage::Background, background)
            .await;
    }

    h.router
        .publish(
            PipelineEvent::new(names::VIDEO_COMPOSE_REQUESTED)
                .for_project(project.id)
                .with_payload(
                    serde_json::to_value(ProjectPayload {
                        project_id: project.id,
                    })
                    .unwrap(),
                ),
        )
        .await
        .unwrap();
    h.scheduler.run_until_idle().await.unwrap();

    let project = h.store.find_project(project.id).await.unwrap().unwrap();
    assert_eq!(project.status, "failed");
    assert!(project.manifest.is_none());
    let message = project.error_message.unwrap();
    assert!(message.contains("scene 4"), "message was: {message}");
    assert!(
        message.contains("background is generating"),
        "message was: {message}"
    );
}

#[tokio::test]
async fn script_content_violations_fail_the_project() {
    let h = harness(
        test_config(),
        Setup {
            canned_scripts: Some(vec![
                "Hello and welcome to cell biology.".to_string(),
                "In this video we cover the cell membrane.".to_string(),
            ]),
            ..Setup::default()
        },
    );
    let project = h.store.seed_project("Bad Script", 30, "preset").await;
    let document = h.store.seed_document(project.id, "Membrane transport.").await;

    h.router
        .publish(
            PipelineEvent::new(names::SCRIPT_GENERATION_REQUESTED)
                .for_project(project.id)
                .with_payload(
                    serde_json::to_value(ScriptGenPayload {
                        project_id: project.id,
                        document_id: document.id,
                    })
                    .unwrap(),
                ),
        )
        .await
        .unwrap();
    h.scheduler.run_until_idle().await.unwrap();

    let project = h.store.find_project(project.id).await.unwrap().unwrap();
    assert_eq!(project.status, "failed");
    let message = project.error_message.unwrap();
    assert!(
        message.contains("violate content rules"),
        "message was: {message}"
    );
    assert!(h.store.list_scenes(project.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn over_budget_script_is_summarized_before_scenes_are_created() {
    let h = harness(
        test_config(),
        Setup {
            canned_scripts: Some(vec!["word ".repeat(100)]),
            ..Setup::default()
        },
    );
    let project = h.store.seed_project("Long Winded", 8, "preset").await;
    let document = h.store.seed_document(project.id, "A very dense page.").await;

    h.router
        .publish(
            PipelineEvent::new(names::SCRIPT_GENERATION_REQUESTED)
                .for_project(project.id)
                .with_payload(
                    serde_json::to_value(ScriptGenPayload {
                        project_id: project.id,
                        document_id: document.id,
                    })
                    .unwrap(),
                ),
        )
        .await
        .unwrap();
    h.scheduler.run_until_idle().await.unwrap();

    assert!(timeline_of(&h).contains(&"script:summarize".to_string()));
    let scenes = h.store.list_scenes(project.id).await.unwrap();
    assert_eq!(scenes.len(), 1);
    assert_eq!(scenes[0].script, SUMMARY);

    let project = h.store.find_project(project.id).await.unwrap().unwrap();
    assert_eq!(project.status, "scenes_processed");
}

#[tokio::test]
async fn re_requested_completed_stage_re_emits_without_new_synthesis() {
    let h = harness(test_config(), Setup::default());
    let project = h.store.seed_project("Replay", 30, "preset").await;
    let scene = h
        .store
        .seed_scene(project.id, 0, "Chloroplasts capture light energy.", "low")
        .await;

    async fn publish_tts(router: &EventRouter, project_id: i64, scene_id: i64) {
        router
            .publish(
                PipelineEvent::new(names::TTS_REQUESTED)
                    .for_project(project_id)
                    .for_scene(scene_id)
                    .with_payload(
                        serde_json::to_value(ScenePayload {
                            project_id,
                            scene_id,
                        })
                        .unwrap(),
                    ),
            )
            .await
            .unwrap();
    }

    publish_tts(&h.router, project.id, scene.id).await;
    h.scheduler.run_until_idle().await.unwrap();
    let first = h.store.find_scene(scene.id).await.unwrap().unwrap();
    let first_asset = first.audio_asset_id.unwrap();

    publish_tts(&h.router, project.id, scene.id).await;
    h.scheduler.run_until_idle().await.unwrap();

    // One synthesis call total; the original artifact is kept.
    let synth_calls = timeline_of(&h)
        .iter()
        .filter(|e| e.as_str() == "tts")
        .count();
    assert_eq!(synth_calls, 1);
    let scene = h.store.find_scene(scene.id).await.unwrap().unwrap();
    assert_eq!(scene.audio_asset_id, Some(first_asset));
    assert_eq!(scene.tts_status(), Some(StageStatus::Completed));
}

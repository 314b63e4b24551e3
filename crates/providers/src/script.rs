//! Script generation adapter.
//!
//! Generation is a synchronous call; the interesting part is output
//! repair and validation. Overlong scene scripts are summarized by a
//! secondary (cheaper) model call, hard-truncated if still over budget,
//! and content-class violations fail the whole generation with an
//! itemized error rather than letting bad narration slip downstream.

use docureel_core::script::{
    needs_summary, truncate_script, validate_scene_scripts, MAX_SCENE_SCRIPT_CHARS,
};
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;
use crate::http::{post_json, HttpProviderConfig};

/// Input for script generation.
#[derive(Debug, Clone, Serialize)]
pub struct ScriptRequest {
    pub document_text: String,
    pub scene_count: usize,
}

/// One generated scene script, in presentation order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneScript {
    pub position: u32,
    pub script: String,
}

#[async_trait::async_trait]
pub trait ScriptGenerator: Send + Sync {
    /// Generate one script per scene from the document text.
    async fn generate(&self, request: &ScriptRequest)
        -> Result<Vec<SceneScript>, ProviderError>;

    /// Condense a script to fit `max_chars` (secondary model call).
    async fn summarize(&self, script: &str, max_chars: usize)
        -> Result<String, ProviderError>;
}

/// Repair lengths, then validate content rules across all scenes.
///
/// Repair order per scene: summarize if over budget, hard-truncate if the
/// summary still does not fit (or summarization itself failed). Content
/// violations are unrepairable and reject the whole batch.
pub async fn finalize_scripts(
    generator: &dyn ScriptGenerator,
    mut scripts: Vec<SceneScript>,
) -> Result<Vec<SceneScript>, ProviderError> {
    for scene in &mut scripts {
        if !needs_summary(&scene.script) {
            continue;
        }
        match generator
            .summarize(&scene.script, MAX_SCENE_SCRIPT_CHARS)
            .await
        {
            Ok(summary) if !needs_summary(&summary) => scene.script = summary,
            Ok(summary) => scene.script = truncate_script(&summary),
            Err(e) => {
                tracing::warn!(
                    position = scene.position,
                    error = %e,
                    "summarization failed, hard-truncating"
                );
                scene.script = truncate_script(&scene.script);
            }
        }
    }

    let texts: Vec<String> = scripts.iter().map(|s| s.script.clone()).collect();
    validate_scene_scripts(&texts).map_err(|e| ProviderError::permanent(e.to_string()))?;

    Ok(scripts)
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    scenes: Vec<SceneScript>,
}

#[derive(Debug, Serialize)]
struct SummarizeRequest<'a> {
    text: &'a str,
    max_chars: usize,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponse {
    summary: String,
}

/// Script generator backed by an LLM HTTP API.
pub struct HttpScriptGenerator {
    client: reqwest::Client,
    config: HttpProviderConfig,
}

impl HttpScriptGenerator {
    pub fn new(config: HttpProviderConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    pub fn from_env() -> Result<Self, ProviderError> {
        Ok(Self::new(HttpProviderConfig::from_env("SCRIPT_PROVIDER")?))
    }
}

#[async_trait::async_trait]
impl ScriptGenerator for HttpScriptGenerator {
    async fn generate(
        &self,
        request: &ScriptRequest,
    ) -> Result<Vec<SceneScript>, ProviderError> {
        let response: GenerateResponse =
            post_json(&self.client, &self.config, "/v1/scripts", request).await?;

        if response.scenes.len() != request.scene_count {
            return Err(ProviderError::permanent(format!(
                "provider returned {} scenes, expected {}",
                response.scenes.len(),
                request.scene_count
            )));
        }
        Ok(response.scenes)
    }

    async fn summarize(
        &self,
        script: &str,
        max_chars: usize,
    ) -> Result<String, ProviderError> {
        let response: SummarizeResponse = post_json(
            &self.client,
            &self.config,
            "/v1/summarize",
            &SummarizeRequest {
                text: script,
                max_chars,
            },
        )
        .await?;
        Ok(response.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeGenerator {
        summary: Result<String, ()>,
    }

    #[async_trait::async_trait]
    impl ScriptGenerator for FakeGenerator {
        async fn generate(
            &self,
            _request: &ScriptRequest,
        ) -> Result<Vec<SceneScript>, ProviderError> {
            unreachable!("not used in these tests")
        }

        async fn summarize(
            &self,
            _script: &str,
            _max_chars: usize,
        ) -> Result<String, ProviderError> {
            self.summary
                .clone()
                .map_err(|_| ProviderError::transient("summarizer down"))
        }
    }

    #[tokio::test]
    async fn compliant_scripts_pass_through_unchanged() {
        let generator = FakeGenerator {
            summary: Err(()),
        };
        let scripts = vec![SceneScript {
            position: 0,
            script: "Mitochondria produce most of the cell's ATP supply.".to_string(),
        }];
        let out = finalize_scripts(&generator, scripts.clone()).await.unwrap();
        assert_eq!(out[0].script, scripts[0].script);
    }

    #[tokio::test]
    async fn over_budget_script_is_summarized() {
        let generator = FakeGenerator {
            summary: Ok("A compact summary of the scene.".to_string()),
        };
        let scripts = vec![SceneScript {
            position: 0,
            script: "word ".repeat(100),
        }];
        let out = finalize_scripts(&generator, scripts).await.unwrap();
        assert_eq!(out[0].script, "A compact summary of the scene.");
    }

    #[tokio::test]
    async fn truncation_kicks_in_when_summarizer_fails() {
        let generator = FakeGenerator {
            summary: Err(()),
        };
        let scripts = vec![SceneScript {
            position: 0,
            script: "word ".repeat(100),
        }];
        let out = finalize_scripts(&generator, scripts).await.unwrap();
        assert!(out[0].script.chars().count() <= MAX_SCENE_SCRIPT_CHARS);
    }

    #[tokio::test]
    async fn content_violations_reject_the_batch_with_all_offenders() {
        let generator = FakeGenerator {
            summary: Err(()),
        };
        let scripts = vec![
            SceneScript {
                position: 0,
                script: "Enzymes lower activation energy.".to_string(),
            },
            SceneScript {
                position: 1,
                script: "Hello and welcome to enzymes.".to_string(),
            },
            SceneScript {
                position: 2,
                script: "In this video we cover catalysis.".to_string(),
            },
        ];
        let err = finalize_scripts(&generator, scripts).await.unwrap_err();
        assert!(err.message.contains("scene 2"));
        assert!(err.message.contains("scene 3"));
    }
}

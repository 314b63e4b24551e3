//! Generated-script validation.
//!
//! Every scene script must fit a strict per-scene character budget (the
//! scene is a fixed-length spoken segment, so overlong text cannot be
//! narrated in time) and must not contain content classes that read badly
//! when spoken by an avatar: greetings, explanatory meta-phrases, and
//! parenthetical asides.
//!
//! Validation is aggregated: the caller gets *every* violating scene in one
//! error, not just the first.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::CoreError;

/// Maximum characters a single scene script may contain.
///
/// Derived from the fixed scene length: at a typical narration pace of
/// ~15 chars/sec, an 8-second scene fits ~120 chars plus headroom.
pub const MAX_SCENE_SCRIPT_CHARS: usize = 160;

/// Greeting openers that must never appear in narration.
static GREETING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*(hello|hi\b|hey\b|welcome|greetings|good (morning|afternoon|evening))")
        .expect("greeting regex is valid")
});

/// Explanatory meta-phrases referring to the video or scene itself.
static META_PHRASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(in this (video|scene|section)|this video (shows|covers|explains)|as (we can|you can) see|let's (dive|take a look|get started)|today (we|i)('ll| will))\b",
    )
    .expect("meta-phrase regex is valid")
});

/// A single rule violation found in one scene script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptViolation {
    /// Script length in characters exceeds [`MAX_SCENE_SCRIPT_CHARS`].
    OverBudget { chars: usize },
    /// Script opens with a greeting.
    Greeting,
    /// Script contains an explanatory meta-phrase.
    MetaPhrase,
    /// Script contains a parenthetical or bracketed aside.
    ParentheticalAside,
}

impl std::fmt::Display for ScriptViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OverBudget { chars } => {
                write!(f, "{chars} chars exceeds budget of {MAX_SCENE_SCRIPT_CHARS}")
            }
            Self::Greeting => f.write_str("opens with a greeting"),
            Self::MetaPhrase => f.write_str("contains an explanatory meta-phrase"),
            Self::ParentheticalAside => f.write_str("contains a parenthetical aside"),
        }
    }
}

/// Check a single scene script against all rules.
///
/// Returns every violation found, in rule order. An empty vec means the
/// script is compliant.
pub fn check_scene_script(script: &str) -> Vec<ScriptViolation> {
    let mut violations = Vec::new();

    let chars = script.chars().count();
    if chars > MAX_SCENE_SCRIPT_CHARS {
        violations.push(ScriptViolation::OverBudget { chars });
    }
    if GREETING_RE.is_match(script) {
        violations.push(ScriptViolation::Greeting);
    }
    if META_PHRASE_RE.is_match(script) {
        violations.push(ScriptViolation::MetaPhrase);
    }
    if script.contains('(') || script.contains('[') {
        violations.push(ScriptViolation::ParentheticalAside);
    }

    violations
}

/// Validate all scene scripts at once, ignoring length violations.
///
/// Length is handled separately (summarize, then truncate) before this
/// check runs; content-class violations cannot be repaired and fail the
/// whole generation with an itemized list of offending scenes
/// (1-based positions).
pub fn validate_scene_scripts(scripts: &[String]) -> Result<(), CoreError> {
    let mut offenders = Vec::new();

    for (index, script) in scripts.iter().enumerate() {
        let violations: Vec<ScriptViolation> = check_scene_script(script)
            .into_iter()
            .filter(|v| !matches!(v, ScriptViolation::OverBudget { .. }))
            .collect();
        if !violations.is_empty() {
            let described: Vec<String> = violations.iter().map(|v| v.to_string()).collect();
            offenders.push(format!("scene {}: {}", index + 1, described.join(", ")));
        }
    }

    if offenders.is_empty() {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "Generated script rejected -- {} scene(s) violate content rules: {}",
            offenders.len(),
            offenders.join("; ")
        )))
    }
}

/// Whether a script needs the summarization fallback before truncation.
pub fn needs_summary(script: &str) -> bool {
    script.chars().count() > MAX_SCENE_SCRIPT_CHARS
}

/// Hard-truncate a script to the scene budget.
///
/// Cuts at the last word boundary that fits so narration never ends
/// mid-word. Already-compliant scripts are returned unchanged.
pub fn truncate_script(script: &str) -> String {
    if script.chars().count() <= MAX_SCENE_SCRIPT_CHARS {
        return script.to_string();
    }

    let cut: String = script.chars().take(MAX_SCENE_SCRIPT_CHARS).collect();
    match cut.rfind(char::is_whitespace) {
        Some(pos) if pos > 0 => cut[..pos].trim_end().to_string(),
        _ => cut,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compliant_script_has_no_violations() {
        let script = "Photosynthesis converts light energy into chemical energy stored in glucose.";
        assert!(check_scene_script(script).is_empty());
    }

    #[test]
    fn over_budget_detected() {
        let script = "a".repeat(MAX_SCENE_SCRIPT_CHARS + 1);
        assert_eq!(
            check_scene_script(&script),
            vec![ScriptViolation::OverBudget {
                chars: MAX_SCENE_SCRIPT_CHARS + 1
            }]
        );
    }

    #[test]
    fn greeting_detected_only_at_start() {
        assert!(check_scene_script("Hello everyone, photosynthesis is fascinating.")
            .contains(&ScriptViolation::Greeting));
        // "hi" embedded mid-sentence is not a greeting opener.
        assert!(check_scene_script("The chlorophyll absorbs light.").is_empty());
    }

    #[test]
    fn meta_phrases_detected() {
        for script in [
            "In this video we explore mitochondria.",
            "As you can see, the membrane folds inward.",
            "Let's dive into the Krebs cycle.",
        ] {
            assert!(
                check_scene_script(script).contains(&ScriptViolation::MetaPhrase),
                "expected meta-phrase violation for: {script}"
            );
        }
    }

    #[test]
    fn parenthetical_asides_detected() {
        assert!(check_scene_script("ATP (adenosine triphosphate) powers the cell.")
            .contains(&ScriptViolation::ParentheticalAside));
        assert!(check_scene_script("ATP [see figure 2] powers the cell.")
            .contains(&ScriptViolation::ParentheticalAside));
    }

    #[test]
    fn validate_lists_every_offending_scene() {
        let scripts = vec![
            "Cells store energy as ATP.".to_string(),
            "Hello and welcome to biology.".to_string(),
            "In this video we cover osmosis (diffusion of water).".to_string(),
        ];
        let err = validate_scene_scripts(&scripts).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("scene 2"), "message was: {msg}");
        assert!(msg.contains("scene 3"), "message was: {msg}");
        assert!(!msg.contains("scene 1"), "message was: {msg}");
    }

    #[test]
    fn validate_ignores_pure_length_violations() {
        // Length is repaired upstream; content validation must pass.
        let scripts = vec!["word ".repeat(100)];
        assert!(validate_scene_scripts(&scripts).is_ok());
    }

    #[test]
    fn truncate_leaves_compliant_script_unchanged() {
        let script = "Short and sweet.";
        assert_eq!(truncate_script(script), script);
    }

    #[test]
    fn truncate_cuts_at_word_boundary() {
        let script = "word ".repeat(100);
        let truncated = truncate_script(&script);
        assert!(truncated.chars().count() <= MAX_SCENE_SCRIPT_CHARS);
        assert!(truncated.ends_with("word"), "got: {truncated:?}");
    }

    #[test]
    fn truncate_is_idempotent() {
        let script = "word ".repeat(100);
        let once = truncate_script(&script);
        assert_eq!(truncate_script(&once), once);
    }

    #[test]
    fn needs_summary_threshold() {
        assert!(!needs_summary(&"a".repeat(MAX_SCENE_SCRIPT_CHARS)));
        assert!(needs_summary(&"a".repeat(MAX_SCENE_SCRIPT_CHARS + 1)));
    }
}

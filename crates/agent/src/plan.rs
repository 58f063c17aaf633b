//! Lenient extraction of an action plan from model output.
//!
//! Models wrap JSON in prose and markdown fences. Extraction starts at the
//! first `{` (or, failing that, the first `[`) and decodes a single JSON
//! value from there, ignoring whatever follows it. Decoding into the plan
//! itself is strict: one malformed action rejects the whole plan.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    Navigate { url: String },
    Click { selector: String },
    Type { selector: String, text: String },
}

impl Action {
    pub fn kind(&self) -> &'static str {
        match self {
            Action::Navigate { .. } => "navigate",
            Action::Click { .. } => "click",
            Action::Type { .. } => "type",
        }
    }

    /// The URL for navigation, the selector otherwise.
    pub fn target(&self) -> &str {
        match self {
            Action::Navigate { url } => url,
            Action::Click { selector } | Action::Type { selector, .. } => selector,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionPlan {
    pub actions: Vec<Action>,
}

impl ActionPlan {
    /// URL of the first navigate action, which decides the tab the plan runs in.
    pub fn first_navigation(&self) -> Option<&str> {
        self.actions.iter().find_map(|a| match a {
            Action::Navigate { url } => Some(url.as_str()),
            _ => None,
        })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("JSON extraction failed: {reason}. Raw text: {raw}")]
    Extraction { reason: String, raw: String },
    #[error("Invalid actions format")]
    InvalidFormat,
}

/// First JSON value in `text`, starting at the first `{`, else the first `[`.
pub fn extract_json(text: &str) -> Result<Value, PlanError> {
    let extraction_failed = |reason: String| PlanError::Extraction {
        reason,
        raw: text.to_string(),
    };
    let start = text
        .find('{')
        .or_else(|| text.find('['))
        .ok_or_else(|| extraction_failed("no JSON object or array found".to_string()))?;

    let mut values = serde_json::Deserializer::from_str(&text[start..]).into_iter::<Value>();
    match values.next() {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(extraction_failed(e.to_string())),
        None => Err(extraction_failed("empty input".to_string())),
    }
}

pub fn parse_plan(text: &str) -> Result<ActionPlan, PlanError> {
    let value = extract_json(text)?;
    if !value.get("actions").map(Value::is_array).unwrap_or(false) {
        return Err(PlanError::InvalidFormat);
    }
    serde_json::from_value(value).map_err(|e| {
        debug!(error = %e, "Action plan rejected");
        PlanError::InvalidFormat
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_plan_with_leading_prose() {
        let text = "Sure! ```json\n{\"actions\":[{\"type\":\"navigate\",\"url\":\"https://example.com\"}]}\n```";
        assert_eq!(
            extract_json(text).unwrap(),
            json!({"actions": [{"type": "navigate", "url": "https://example.com"}]})
        );
        let plan = parse_plan(text).unwrap();
        assert_eq!(plan.first_navigation(), Some("https://example.com"));
    }

    #[test]
    fn test_all_action_kinds_decode() {
        let plan = parse_plan(
            r#"{"actions":[
                {"type":"click","selector":"button[name=\"go\"]"},
                {"type":"type","selector":"input#q","text":"rust async"},
                {"type":"navigate","url":"https://docs.rs"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            plan.actions,
            vec![
                Action::Click {
                    selector: r#"button[name="go"]"#.to_string()
                },
                Action::Type {
                    selector: "input#q".to_string(),
                    text: "rust async".to_string()
                },
                Action::Navigate {
                    url: "https://docs.rs".to_string()
                },
            ]
        );
        assert_eq!(plan.actions[1].kind(), "type");
        assert_eq!(plan.actions[2].target(), "https://docs.rs");
    }

    #[test]
    fn test_no_json_reports_raw_text() {
        let err = parse_plan("I can't help with that.").unwrap_err();
        assert!(matches!(err, PlanError::Extraction { .. }));
        assert!(err.to_string().starts_with("JSON extraction failed"));
        assert!(err.to_string().ends_with("Raw text: I can't help with that."));
    }

    #[test]
    fn test_truncated_json_is_an_extraction_failure() {
        let err = parse_plan(r#"{"actions": [{"type": "click""#).unwrap_err();
        assert!(matches!(err, PlanError::Extraction { .. }));
    }

    #[test]
    fn test_missing_or_malformed_actions() {
        assert_eq!(parse_plan(r#"{"steps": []}"#), Err(PlanError::InvalidFormat));
        assert_eq!(parse_plan(r#"{"actions": {"type": "click"}}"#), Err(PlanError::InvalidFormat));
        assert_eq!(
            parse_plan(r#"[{"type":"click","selector":"a"}]"#),
            Err(PlanError::InvalidFormat)
        );
    }

    #[test]
    fn test_unknown_kind_or_missing_field_rejects_plan() {
        assert_eq!(
            parse_plan(r#"{"actions":[{"type":"scroll","by":300}]}"#),
            Err(PlanError::InvalidFormat)
        );
        assert_eq!(
            parse_plan(r#"{"actions":[{"type":"type","selector":"input"}]}"#),
            Err(PlanError::InvalidFormat)
        );
    }

    #[test]
    fn test_empty_plan_is_valid() {
        assert!(parse_plan(r#"{"actions": []}"#).unwrap().actions.is_empty());
    }
}

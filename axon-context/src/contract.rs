//! Dotted-path existence checks for agent contracts.
//!
//! Pre/postconditions name context fields as dotted paths
//! (`"reasoning.intents"`). A path is satisfied when it resolves and
//! the value is non-empty: arrays and objects must have members,
//! strings must be non-blank, `null` never satisfies, and any number
//! or boolean does.

/// Whether `path` resolves in `value` to a non-empty leaf.
pub fn path_satisfied(value: &serde_json::Value, path: &str) -> bool {
    let mut cursor = value;
    for segment in path.split('.') {
        match cursor.get(segment) {
            Some(next) => cursor = next,
            None => return false,
        }
    }
    match cursor {
        serde_json::Value::Null => false,
        serde_json::Value::Array(items) => !items.is_empty(),
        serde_json::Value::Object(map) => !map.is_empty(),
        serde_json::Value::String(s) => !s.trim().is_empty(),
        serde_json::Value::Bool(_) | serde_json::Value::Number(_) => true,
    }
}

/// The subset of `paths` not satisfied in `value`.
pub fn missing_paths<'a>(value: &serde_json::Value, paths: &'a [String]) -> Vec<&'a str> {
    paths
        .iter()
        .filter(|p| !path_satisfied(value, p))
        .map(|p| p.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::AgentContext;
    use crate::entities::{Intent, IntentOrigin};

    #[test]
    fn empty_array_does_not_satisfy() {
        let ctx = AgentContext::new("s", "t");
        let value = ctx.to_value();
        assert!(!path_satisfied(&value, "reasoning.intents"));
        assert!(!path_satisfied(&value, "reasoning.summary"));
    }

    #[test]
    fn populated_array_satisfies() {
        let mut ctx = AgentContext::new("s", "t");
        ctx.reasoning.intents.push(Intent {
            intent_type: "query".into(),
            confidence: 0.9,
            origin: IntentOrigin::Rules,
        });
        let value = ctx.to_value();
        assert!(path_satisfied(&value, "reasoning.intents"));
    }

    #[test]
    fn unknown_path_does_not_satisfy() {
        let ctx = AgentContext::new("s", "t");
        let value = ctx.to_value();
        assert!(!path_satisfied(&value, "reasoning.nope"));
        assert!(!path_satisfied(&value, "nope.at.all"));
    }

    #[test]
    fn scalars_satisfy_when_non_empty() {
        let value = serde_json::json!({
            "metadata": {"session_id": "s-1", "created_at": 0, "empty": ""}
        });
        assert!(path_satisfied(&value, "metadata.session_id"));
        assert!(path_satisfied(&value, "metadata.created_at"));
        assert!(!path_satisfied(&value, "metadata.empty"));
    }

    #[test]
    fn missing_paths_reports_only_unsatisfied() {
        let mut ctx = AgentContext::new("s", "t");
        ctx.reasoning.summary = "done".into();
        let value = ctx.to_value();
        let paths = vec![
            "reasoning.summary".to_string(),
            "enrichment.facts".to_string(),
        ];
        assert_eq!(missing_paths(&value, &paths), vec!["enrichment.facts"]);
    }
}

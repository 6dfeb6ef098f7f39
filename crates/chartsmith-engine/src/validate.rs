use chartsmith_contracts::{RawRecommendation, RecommendError};
use serde_json::Value;

pub const EXPECTED_PROPOSALS: usize = 3;

pub const REQUIRED_PROPOSAL_FIELDS: [&str; 5] =
    ["viz_type", "title", "x_axis", "y_axis", "justification"];

/// Removes an optional wrapping code fence (with or without a language tag
/// after the opening backticks) so the payload can be parsed as JSON.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = body.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim()
}

/// Enforces the structural contract of a recommendation response: a JSON
/// object with a `visualizations` array of exactly three proposals, each
/// carrying the required fields. The content itself is left untouched.
pub fn validate_response(text: &str) -> Result<RawRecommendation, RecommendError> {
    let cleaned = strip_code_fence(text);
    let parsed: Value = serde_json::from_str(cleaned).map_err(|err| {
        RecommendError::MalformedResponse {
            detail: err.to_string(),
            raw: text.to_string(),
        }
    })?;
    let root = parsed
        .as_object()
        .cloned()
        .ok_or_else(|| RecommendError::MalformedResponse {
            detail: "top-level value is not an object".to_string(),
            raw: text.to_string(),
        })?;

    let proposals = root
        .get("visualizations")
        .and_then(Value::as_array)
        .ok_or(RecommendError::MissingField("visualizations"))?;
    if proposals.len() != EXPECTED_PROPOSALS {
        return Err(RecommendError::WrongCount(proposals.len()));
    }

    for (index, proposal) in proposals.iter().enumerate() {
        let entry = proposal.as_object();
        let missing: Vec<String> = REQUIRED_PROPOSAL_FIELDS
            .iter()
            .filter(|field| entry.map_or(true, |object| !object.contains_key(**field)))
            .map(|field| field.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(RecommendError::MissingFields {
                index,
                names: missing,
            });
        }
    }

    Ok(RawRecommendation(root))
}

#[cfg(test)]
mod tests {
    use chartsmith_contracts::RecommendError;
    use serde_json::json;

    use super::{strip_code_fence, validate_response};

    fn proposal(viz_type: &str) -> serde_json::Value {
        json!({
            "viz_type": viz_type,
            "title": "t",
            "x_axis": "a",
            "y_axis": "b",
            "justification": "j"
        })
    }

    fn response_with(count: usize) -> String {
        let proposals: Vec<serde_json::Value> =
            (0..count).map(|_| proposal("scatter_plot")).collect();
        json!({"analysis": "a", "visualizations": proposals}).to_string()
    }

    #[test]
    fn strips_fence_with_language_tag() {
        let wrapped = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fence(wrapped), "{\"a\": 1}");
    }

    #[test]
    fn strips_bare_fence_and_leaves_plain_text_alone() {
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {} "), "{}");
        assert_eq!(strip_code_fence("```json{\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn accepts_exactly_three_proposals() {
        assert!(validate_response(&response_with(3)).is_ok());
    }

    #[test]
    fn rejects_wrong_proposal_counts() {
        for count in [2usize, 4] {
            match validate_response(&response_with(count)) {
                Err(RecommendError::WrongCount(actual)) => assert_eq!(actual, count),
                other => panic!("expected WrongCount, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_missing_visualizations_field() {
        let result = validate_response(&json!({"analysis": "a"}).to_string());
        assert!(matches!(
            result,
            Err(RecommendError::MissingField("visualizations"))
        ));
    }

    #[test]
    fn names_the_entry_and_fields_when_required_fields_are_absent() {
        let mut incomplete = proposal("bar_chart");
        if let Some(object) = incomplete.as_object_mut() {
            object.remove("justification");
        }
        let text = json!({
            "visualizations": [proposal("scatter_plot"), incomplete, proposal("box_plot")]
        })
        .to_string();

        match validate_response(&text) {
            Err(RecommendError::MissingFields { index, names }) => {
                assert_eq!(index, 1);
                assert_eq!(names, vec!["justification".to_string()]);
            }
            other => panic!("expected MissingFields, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_error_carries_raw_text() {
        let text = "```json\nnot json\n```";
        match validate_response(text) {
            Err(RecommendError::MalformedResponse { raw, .. }) => assert_eq!(raw, text),
            other => panic!("expected MalformedResponse, got {other:?}"),
        }
    }

    #[test]
    fn validated_content_is_unchanged() -> anyhow::Result<()> {
        let text = response_with(3);
        let validated = validate_response(&text)?;
        let reparsed: serde_json::Value = serde_json::from_str(&text)?;
        assert_eq!(serde_json::to_value(&validated)?, reparsed);
        Ok(())
    }
}

//! Structured response extraction
//!
//! Generative-model text is not guaranteed to be bare JSON. The report may
//! be wrapped in a ```` ```json ```` fence, surrounded by prose, or broken.
//! Every outcome is returned as a value; nothing here panics.
//!
//! Candidate selection:
//! 1. If a ```` ```json ```` fence is present, the text strictly between it and
//!    the next ```` ``` ```` (or the end of the text when unclosed).
//! 2. Otherwise the whole trimmed text.
//!
//! The candidate is parsed as a JSON object; failing that, the first
//! balanced `{...}` inside it that parses as an object is used. Valid JSON
//! with no object in it is a schema mismatch with every key missing; text
//! that is not JSON at all is malformed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ExtractionError;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Keys the voice report must contain
pub const REQUIRED_KEYS: [&str; 8] = [
    "Smoothness",
    "Control",
    "Liveliness",
    "Energy_range",
    "Clarity",
    "Crispness",
    "Speech",
    "Pause",
];

/// Validated voice-quality report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceAnalysis {
    #[serde(rename = "Smoothness")]
    pub smoothness: String,
    #[serde(rename = "Control")]
    pub control: String,
    #[serde(rename = "Liveliness")]
    pub liveliness: String,
    #[serde(rename = "Energy_range")]
    pub energy_range: String,
    #[serde(rename = "Clarity")]
    pub clarity: String,
    #[serde(rename = "Crispness")]
    pub crispness: String,
    #[serde(rename = "Speech")]
    pub speech: String,
    #[serde(rename = "Pause")]
    pub pause: String,
}

/// Extract a voice report from raw model text
pub fn extract(raw: &str) -> Result<VoiceAnalysis, ExtractionError> {
    let candidate = candidate_text(raw);
    let object = parse_object(candidate)?;
    analysis_from_object(&object)
}

/// Select the JSON candidate (fenced block contents or the trimmed text)
pub fn candidate_text(raw: &str) -> &str {
    match raw.find(JSON_FENCE) {
        Some(start) => {
            let body = &raw[start + JSON_FENCE.len()..];
            let end = body.find(FENCE).unwrap_or(body.len());
            body[..end].trim()
        }
        None => raw.trim(),
    }
}

/// Valid JSON that is not an object (and holds no object) lacks every key
fn parse_object(candidate: &str) -> Result<Map<String, Value>, ExtractionError> {
    let parsed = serde_json::from_str::<Value>(candidate);
    if let Ok(Value::Object(object)) = parsed {
        return Ok(object);
    }
    if let Some(object) = embedded_object(candidate) {
        return Ok(object);
    }
    match parsed {
        Ok(_) => Err(ExtractionError::SchemaMismatch {
            missing: REQUIRED_KEYS.iter().map(|key| key.to_string()).collect(),
        }),
        Err(_) => Err(ExtractionError::MalformedResponse),
    }
}

/// First balanced `{...}` (by opening position) that parses as an object
fn embedded_object(text: &str) -> Option<Map<String, Value>> {
    balanced_spans(text)
        .into_iter()
        .find_map(|(start, end)| match serde_json::from_str::<Value>(&text[start..end]) {
            Ok(Value::Object(object)) => Some(object),
            _ => None,
        })
}

/// Byte ranges of every balanced brace pair, sorted by opening offset.
///
/// One pass over the text with a stack of open-brace offsets; braces inside
/// string literals are ignored and stray closing braces are skipped.
fn balanced_spans(text: &str) -> Vec<(usize, usize)> {
    let mut open: Vec<usize> = Vec::new();
    let mut spans = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => open.push(offset),
            '}' => {
                if let Some(start) = open.pop() {
                    spans.push((start, offset + 1));
                }
            }
            _ => {}
        }
    }

    spans.sort_unstable_by_key(|&(start, _)| start);
    spans
}

/// Scalar JSON values are accepted as strings; anything else is unusable
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn analysis_from_object(object: &Map<String, Value>) -> Result<VoiceAnalysis, ExtractionError> {
    let values: Vec<Option<String>> = REQUIRED_KEYS
        .iter()
        .map(|key| object.get(*key).and_then(scalar_string))
        .collect();

    let missing: Vec<String> = REQUIRED_KEYS
        .iter()
        .zip(&values)
        .filter(|(_, value)| value.is_none())
        .map(|(key, _)| key.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ExtractionError::SchemaMismatch { missing });
    }

    let mut values = values.into_iter().flatten();
    let mut next = || values.next().unwrap_or_default();
    Ok(VoiceAnalysis {
        smoothness: next(),
        control: next(),
        liveliness: next(),
        energy_range: next(),
        clarity: next(),
        crispness: next(),
        speech: next(),
        pause: next(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const REPORT: &str = r#"{
        "Smoothness": "82 %",
        "Control": "75 %",
        "Liveliness": "0.64",
        "Energy_range": "18 dB",
        "Clarity": "120 ms",
        "Crispness": "0.71",
        "Speech": "Normal",
        "Pause": "Regular"
    }"#;

    fn expected() -> VoiceAnalysis {
        VoiceAnalysis {
            smoothness: "82 %".to_string(),
            control: "75 %".to_string(),
            liveliness: "0.64".to_string(),
            energy_range: "18 dB".to_string(),
            clarity: "120 ms".to_string(),
            crispness: "0.71".to_string(),
            speech: "Normal".to_string(),
            pause: "Regular".to_string(),
        }
    }

    #[test]
    fn test_fenced_json_round_trips() {
        let raw = format!("```json\n{}\n```", REPORT);
        assert_eq!(extract(&raw), Ok(expected()));
    }

    #[test]
    fn test_fenced_json_inline() {
        let compact = serde_json::to_string(&expected()).unwrap();
        let raw = format!("```json {} ```", compact);
        assert_eq!(extract(&raw), Ok(expected()));
    }

    #[test]
    fn test_fence_with_surrounding_prose() {
        let raw = format!(
            "Here is the analysis you asked for:\n```json\n{}\n```\nLet me know if you need more.",
            REPORT
        );
        assert_eq!(extract(&raw), Ok(expected()));
    }

    #[test]
    fn test_unclosed_fence_takes_rest() {
        let raw = format!("```json\n{}", REPORT);
        assert_eq!(extract(&raw), Ok(expected()));
    }

    #[test]
    fn test_bare_json() {
        assert_eq!(extract(&format!("  \n{}\n ", REPORT)), Ok(expected()));
    }

    #[test]
    fn test_unfenced_json_in_prose() {
        let raw = format!("Sure! {} Hope this helps.", REPORT);
        assert_eq!(extract(&raw), Ok(expected()));
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_scan() {
        let raw = r#"Note {not json} then {"Smoothness": "8}0 %", "Control": "7{5 %", "Liveliness": "0.5", "Energy_range": "10 dB", "Clarity": "90 ms", "Crispness": "0.4", "Speech": "Monotone", "Pause": "Filled \"Pauses\""} end"#;
        let analysis = extract(raw).unwrap();
        assert_eq!(analysis.smoothness, "8}0 %");
        assert_eq!(analysis.control, "7{5 %");
        assert_eq!(analysis.pause, "Filled \"Pauses\"");
    }

    #[test]
    fn test_no_json_is_malformed() {
        assert_eq!(
            extract("I could not analyse this audio clip."),
            Err(ExtractionError::MalformedResponse)
        );
        assert_eq!(extract(""), Err(ExtractionError::MalformedResponse));
        assert_eq!(extract("```json\n```"), Err(ExtractionError::MalformedResponse));
    }

    #[test]
    fn test_broken_json_is_malformed() {
        let raw = "```json\n{\"Smoothness\": \"82 %\", \"Control\": \n```";
        assert_eq!(extract(raw), Err(ExtractionError::MalformedResponse));
    }

    #[test]
    fn test_non_object_json_is_schema_mismatch() {
        let all_missing: Vec<String> = REQUIRED_KEYS.iter().map(|k| k.to_string()).collect();
        for raw in ["[1, 2, 3]", "42", "\"hello\"", "```json\nnull\n```"] {
            assert_eq!(
                extract(raw),
                Err(ExtractionError::SchemaMismatch {
                    missing: all_missing.clone()
                }),
                "input {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_array_wrapping_report_uses_inner_object() {
        let raw = format!("[{}]", REPORT);
        assert_eq!(extract(&raw), Ok(expected()));
    }

    #[test]
    fn test_nested_object_prefers_outermost() {
        let raw = r#"result: {"Smoothness": "1 %", "Control": "2 %", "Liveliness": "0.1", "Energy_range": "3 dB", "Clarity": "4 ms", "Crispness": "0.2", "Speech": "Normal", "Pause": "Regular", "meta": {"model": "x"}} done"#;
        let analysis = extract(raw).unwrap();
        assert_eq!(analysis.smoothness, "1 %");
        assert_eq!(analysis.pause, "Regular");
    }

    #[test]
    fn test_unbalanced_open_braces_scan_is_linear() {
        let raw = "{".repeat(200_000);
        let started = std::time::Instant::now();
        assert_eq!(extract(&raw), Err(ExtractionError::MalformedResponse));
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_balanced_spans_sorted_by_opening() {
        let text = r#"a {b {c} "}" d} {e}"#;
        let spans: Vec<&str> = balanced_spans(text)
            .into_iter()
            .map(|(start, end)| &text[start..end])
            .collect();
        assert_eq!(spans, vec![r#"{b {c} "}" d}"#, "{c}", "{e}"]);
    }

    #[test]
    fn test_missing_key_is_schema_mismatch() {
        let mut object = serde_json::to_value(expected()).unwrap();
        object.as_object_mut().unwrap().remove("Pause");
        let raw = format!("```json\n{}\n```", object);

        assert_eq!(
            extract(&raw),
            Err(ExtractionError::SchemaMismatch {
                missing: vec!["Pause".to_string()]
            })
        );
    }

    #[test]
    fn test_null_and_nested_values_are_schema_mismatch() {
        let mut object = serde_json::to_value(expected()).unwrap();
        object["Clarity"] = Value::Null;
        object["Speech"] = json!({"type": "Normal"});

        match extract(&object.to_string()) {
            Err(ExtractionError::SchemaMismatch { missing }) => {
                assert_eq!(missing, vec!["Clarity".to_string(), "Speech".to_string()]);
            }
            other => panic!("Expected SchemaMismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_numeric_values_are_stringified() {
        let mut object = serde_json::to_value(expected()).unwrap();
        object["Liveliness"] = json!(0.64);
        object["Crispness"] = json!(1);

        let analysis = extract(&object.to_string()).unwrap();
        assert_eq!(analysis.liveliness, "0.64");
        assert_eq!(analysis.crispness, "1");
    }

    #[test]
    fn test_extra_keys_are_dropped() {
        let mut object = serde_json::to_value(expected()).unwrap();
        object["Comment"] = json!("lovely voice");

        let analysis = extract(&object.to_string()).unwrap();
        let rendered = serde_json::to_value(&analysis).unwrap();
        assert_eq!(rendered.as_object().unwrap().len(), 8);
        assert!(rendered.get("Comment").is_none());
    }

    #[test]
    fn test_serialized_keys_match_required_set() {
        let rendered = serde_json::to_value(expected()).unwrap();
        let keys: Vec<&String> = rendered.as_object().unwrap().keys().collect();
        for key in REQUIRED_KEYS {
            assert!(keys.iter().any(|k| k.as_str() == key), "missing {}", key);
        }
    }

    #[test]
    fn test_candidate_text_selection() {
        assert_eq!(candidate_text("  {\"a\": 1}  "), "{\"a\": 1}");
        assert_eq!(candidate_text("x ```json {\"a\": 1} ``` y"), "{\"a\": 1}");
        assert_eq!(candidate_text("```json {\"a\": 1}"), "{\"a\": 1}");
    }
}

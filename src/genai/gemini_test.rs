use std::time::Duration;

use super::*;
use crate::genai::types::{GenerationParams, Part};

fn params() -> GenerationParams {
    GenerationParams {
        temperature: 0.7,
        max_output_tokens: 3000,
        timeout: Duration::from_secs(120),
    }
}

#[test]
fn parse_response_concatenates_text_parts() {
    let json = r#"{
        "candidates": [
            {"content": {"parts": [{"text": "Hello, "}, {"text": "world"}]}}
        ]
    }"#;
    let text = parse_response(json).unwrap();
    assert_eq!(text, "Hello, world");
}

#[test]
fn parse_response_uses_first_candidate_only() {
    let json = r#"{
        "candidates": [
            {"content": {"parts": [{"text": "first"}]}},
            {"content": {"parts": [{"text": "second"}]}}
        ]
    }"#;
    assert_eq!(parse_response(json).unwrap(), "first");
}

#[test]
fn parse_response_no_candidates_is_error() {
    let err = parse_response(r#"{"candidates": []}"#).unwrap_err();
    assert!(matches!(err, GenAiError::ApiParse(_)));
}

#[test]
fn parse_response_missing_candidates_field_is_error() {
    let err = parse_response("{}").unwrap_err();
    assert!(matches!(err, GenAiError::ApiParse(_)));
}

#[test]
fn parse_response_candidate_without_text_is_error() {
    let json = r#"{"candidates": [{"content": {"parts": [{}]}}]}"#;
    let err = parse_response(json).unwrap_err();
    assert!(matches!(err, GenAiError::ApiParse(_)));
}

#[test]
fn parse_response_invalid_json_is_error() {
    let err = parse_response("not json").unwrap_err();
    assert!(matches!(err, GenAiError::ApiParse(_)));
}

#[test]
fn build_request_serializes_text_part() {
    let req = build_request(&[Part::Text("make cards".into())], params());
    let json = serde_json::to_value(&req).unwrap();
    assert_eq!(json["contents"][0]["parts"][0]["text"], "make cards");
    assert_eq!(json["generationConfig"]["maxOutputTokens"], 3000);
    let temp = json["generationConfig"]["temperature"].as_f64().unwrap();
    assert!((temp - 0.7).abs() < 1e-6);
}

#[test]
fn build_request_base64_encodes_inline_data() {
    let parts = [
        Part::Text("describe this".into()),
        Part::InlineData { mime_type: "image/png".into(), data: vec![1, 2, 3] },
    ];
    let req = build_request(&parts, params());
    let json = serde_json::to_value(&req).unwrap();
    let inline = &json["contents"][0]["parts"][1]["inlineData"];
    assert_eq!(inline["mimeType"], "image/png");
    assert_eq!(inline["data"], "AQID");
}

use super::*;

// =============================================================================
// extract_json
// =============================================================================

#[test]
fn extract_json_strips_json_fence() {
    let response = "```json\n{\"title\": \"Rust\"}\n```";
    assert_eq!(extract_json(response), "{\"title\": \"Rust\"}");
}

#[test]
fn extract_json_strips_bare_fence() {
    let response = "```\n[{\"front\": \"a\", \"back\": \"b\"}]\n```";
    assert_eq!(extract_json(response), "[{\"front\": \"a\", \"back\": \"b\"}]");
}

#[test]
fn extract_json_passes_unfenced_through() {
    assert_eq!(extract_json("  {\"title\": \"Rust\"}  "), "{\"title\": \"Rust\"}");
}

#[test]
fn extract_json_keeps_preamble_out() {
    let response = "Here are your cards:\n```json\n{\"cards\": []}\n```\nEnjoy!";
    assert_eq!(extract_json(response), "{\"cards\": []}");
}

#[test]
fn extract_json_unclosed_fence_falls_back_to_whole_text() {
    let response = "```json\n{\"title\": \"Rust\"}";
    assert_eq!(extract_json(response), response.trim());
}

// =============================================================================
// validate_cards
// =============================================================================

fn card(front: &str, back: &str) -> GeneratedCard {
    GeneratedCard { front: front.to_owned(), back: back.to_owned() }
}

#[test]
fn validate_cards_trims_whitespace() {
    let valid = validate_cards(vec![card("  What is ownership?  ", "  A set of rules.  ")])
        .expect("card should survive");
    assert_eq!(valid, vec![("What is ownership?".to_owned(), "A set of rules.".to_owned())]);
}

#[test]
fn validate_cards_drops_blank_front() {
    let valid = validate_cards(vec![card("   ", "back"), card("front", "back")])
        .expect("one card should survive");
    assert_eq!(valid.len(), 1);
}

#[test]
fn validate_cards_drops_oversized_back() {
    let long = "x".repeat(1001);
    let valid = validate_cards(vec![card("front", &long), card("front", "back")])
        .expect("one card should survive");
    assert_eq!(valid.len(), 1);
}

#[test]
fn validate_cards_keeps_exactly_1000_bytes() {
    let max = "x".repeat(1000);
    let valid = validate_cards(vec![card(&max, &max)]).expect("card at the limit survives");
    assert_eq!(valid.len(), 1);
}

#[test]
fn validate_cards_all_invalid_is_an_error() {
    let err = validate_cards(vec![card("", "back"), card("front", "")])
        .expect_err("nothing survives");
    assert!(matches!(err, GenerateError::NoValidCards));
}

#[test]
fn validate_cards_empty_input_is_an_error() {
    assert!(matches!(validate_cards(vec![]), Err(GenerateError::NoValidCards)));
}

// =============================================================================
// input validation
// =============================================================================

#[test]
fn validate_image_accepts_png_under_limit() {
    assert!(validate_image("image/png", 1024).is_ok());
}

#[test]
fn validate_image_rejects_gif() {
    assert!(matches!(
        validate_image("image/gif", 1024),
        Err(GenerateError::UnsupportedMediaType(_))
    ));
}

#[test]
fn validate_image_rejects_oversized() {
    assert!(matches!(
        validate_image("image/png", MAX_IMAGE_BYTES + 1),
        Err(GenerateError::FileTooLarge { .. })
    ));
}

#[test]
fn validate_image_accepts_exact_limit() {
    assert!(validate_image("image/webp", MAX_IMAGE_BYTES).is_ok());
}

#[test]
fn validate_audio_accepts_mp3() {
    assert!(validate_audio("audio/mp3", 1024, false).is_ok());
}

#[test]
fn validate_audio_webm_only_when_allowed() {
    assert!(validate_audio("audio/webm", 1024, false).is_err());
    assert!(validate_audio("audio/webm", 1024, true).is_ok());
}

#[test]
fn validate_audio_rejects_oversized() {
    assert!(matches!(
        validate_audio("audio/wav", MAX_AUDIO_BYTES + 1, false),
        Err(GenerateError::FileTooLarge { .. })
    ));
}

#[test]
fn validate_max_cards_accepts_bounds() {
    assert_eq!(validate_max_cards(1).expect("1 is valid"), 1);
    assert_eq!(validate_max_cards(100).expect("100 is valid"), 100);
    assert_eq!(validate_max_cards(DEFAULT_MAX_CARDS).expect("default is valid"), 20);
}

#[test]
fn validate_max_cards_rejects_out_of_range() {
    assert!(matches!(validate_max_cards(0), Err(GenerateError::BadCardCount)));
    assert!(matches!(validate_max_cards(101), Err(GenerateError::BadCardCount)));
}

// =============================================================================
// prompts
// =============================================================================

#[test]
fn new_deck_prompt_embeds_topic_and_count() {
    let input = GenInput::Text { prompt: "Rust ownership".into() };
    let prompt = new_deck_prompt(&input, 15);
    assert!(prompt.contains("15"));
    assert!(prompt.contains("Rust ownership"));
    assert!(prompt.contains("\"title\""));
    assert!(prompt.contains("\"cards\""));
}

#[test]
fn append_prompt_asks_for_bare_array() {
    let input = GenInput::Text { prompt: "Rust ownership".into() };
    let prompt = append_prompt(&input, 5);
    assert!(prompt.contains("JSON array"));
    assert!(!prompt.contains("\"title\""));
}

#[test]
fn regenerate_prompt_for_text_embeds_topic_and_feedback() {
    let prompt = regenerate_prompt("text", 10, Some("Rust ownership"), "make them harder");
    assert!(prompt.contains("Rust ownership"));
    assert!(prompt.contains("make them harder"));
    assert!(prompt.contains("10"));
}

#[test]
fn regenerate_prompt_for_media_is_feedback_only() {
    let prompt = regenerate_prompt("image", 10, None, "make them harder");
    assert!(prompt.contains("make them harder"));
    assert!(prompt.contains("previous"));
}

// =============================================================================
// parsing
// =============================================================================

#[test]
fn parse_deck_reads_fenced_response() {
    let response = "```json\n{\"title\": \"Verbs\", \"description\": \"Common verbs\", \
                    \"cards\": [{\"front\": \"run\", \"back\": \"to move fast\"}]}\n```";
    let deck = parse_deck(response).expect("should parse");
    assert_eq!(deck.title, "Verbs");
    assert_eq!(deck.description.as_deref(), Some("Common verbs"));
    assert_eq!(deck.cards.len(), 1);
}

#[test]
fn parse_deck_allows_missing_description() {
    let deck = parse_deck("{\"title\": \"Verbs\", \"cards\": []}").expect("should parse");
    assert!(deck.description.is_none());
}

#[test]
fn parse_deck_rejects_prose() {
    assert!(matches!(
        parse_deck("Sorry, I cannot help with that."),
        Err(GenerateError::ParseFailed(_))
    ));
}

#[test]
fn parse_card_array_reads_fenced_list() {
    let response = "```\n[{\"front\": \"a\", \"back\": \"b\"}, {\"front\": \"c\", \"back\": \"d\"}]\n```";
    let cards = parse_card_array(response).expect("should parse");
    assert_eq!(cards.len(), 2);
}

// =============================================================================
// run_model
// =============================================================================

struct RecordingProvider {
    parts: std::sync::Mutex<Vec<Part>>,
}

#[async_trait::async_trait]
impl GenerateText for RecordingProvider {
    async fn generate(
        &self,
        parts: &[Part],
        _params: GenerationParams,
    ) -> Result<String, GenAiError> {
        *self.parts.lock().unwrap() = parts.to_vec();
        Ok("ok".into())
    }
}

#[tokio::test]
async fn run_model_sends_text_prompt_only() {
    let provider = RecordingProvider { parts: std::sync::Mutex::new(Vec::new()) };
    let input = GenInput::Text { prompt: "Rust".into() };
    run_model(&provider, &input, "the prompt".into(), deck_params())
        .await
        .expect("mock always succeeds");

    let parts = provider.parts.lock().unwrap();
    assert_eq!(parts.len(), 1);
    assert!(matches!(&parts[0], Part::Text(t) if t == "the prompt"));
}

#[tokio::test]
async fn run_model_attaches_inline_media() {
    let provider = RecordingProvider { parts: std::sync::Mutex::new(Vec::new()) };
    let input = GenInput::Image { mime_type: "image/png".into(), data: vec![1, 2, 3] };
    run_model(&provider, &input, "the prompt".into(), deck_params())
        .await
        .expect("mock always succeeds");

    let parts = provider.parts.lock().unwrap();
    assert_eq!(parts.len(), 2);
    assert!(matches!(
        &parts[1],
        Part::InlineData { mime_type, data } if mime_type == "image/png" && data == &[1, 2, 3]
    ));
}

// =============================================================================
// GenInput
// =============================================================================

#[test]
fn generation_type_per_modality() {
    assert_eq!(GenInput::Text { prompt: "x".into() }.generation_type(), "text");
    assert_eq!(
        GenInput::Image { mime_type: "image/png".into(), data: vec![] }.generation_type(),
        "image"
    );
    assert_eq!(
        GenInput::Audio { mime_type: "audio/mp3".into(), data: vec![] }.generation_type(),
        "audio"
    );
}

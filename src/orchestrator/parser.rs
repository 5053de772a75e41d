// Strict parsing of provider output into ad variations
// Author: kelexine (https://github.com/kelexine)

use crate::models::{AdVariation, GenerationRequest};
use serde::Deserialize;
use std::collections::HashSet;

const MAX_TAGLINE_WORDS: usize = 10;
const MIN_WORDS_PER_SECOND: f64 = 1.0;
const MAX_WORDS_PER_SECOND: f64 = 3.5;

#[derive(Debug, Deserialize)]
struct Envelope {
    variations: Vec<AdVariation>,
}

/// Strip an optional markdown code fence around the payload.
fn unfence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Parse and validate the provider's answer for `request`.
///
/// The error string says what was wrong so it can be fed back in the repair prompt.
pub fn parse_variations(text: &str, request: &GenerationRequest) -> Result<Vec<AdVariation>, String> {
    let envelope: Envelope = serde_json::from_str(unfence(text))
        .map_err(|e| format!("response is not the expected JSON object ({})", e))?;

    let expected = request.variations as usize;
    if envelope.variations.len() != expected {
        return Err(format!(
            "expected {} variations, got {}",
            expected,
            envelope.variations.len()
        ));
    }

    let duration = request.duration_bucket() as f64;
    let min_words = (duration * MIN_WORDS_PER_SECOND).ceil() as usize;
    let max_words = (duration * MAX_WORDS_PER_SECOND).floor() as usize;

    let mut seen = HashSet::new();
    let mut variations = Vec::with_capacity(expected);
    for (i, v) in envelope.variations.into_iter().enumerate() {
        let n = i + 1;
        let variation = AdVariation {
            tagline: v.tagline.trim().to_string(),
            script: v.script.trim().to_string(),
            cta: v.cta.trim().to_string(),
        };

        let tagline_words = word_count(&variation.tagline);
        if !(1..=MAX_TAGLINE_WORDS).contains(&tagline_words) {
            return Err(format!(
                "variation {} tagline has {} words, expected 1-{}",
                n, tagline_words, MAX_TAGLINE_WORDS
            ));
        }
        if variation.cta.is_empty() {
            return Err(format!("variation {} has an empty cta", n));
        }
        let script_words = word_count(&variation.script);
        if !(min_words..=max_words).contains(&script_words) {
            return Err(format!(
                "variation {} script has {} words, expected {}-{}",
                n, script_words, min_words, max_words
            ));
        }

        let key = (
            variation.tagline.to_lowercase(),
            variation.script.to_lowercase(),
        );
        if !seen.insert(key) {
            return Err(format!("variation {} duplicates an earlier one", n));
        }
        variations.push(variation);
    }

    Ok(variations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContentType, Tone};
    use serde_json::json;

    fn request(variations: u32) -> GenerationRequest {
        GenerationRequest::new("Premium Coffee", Tone::Luxury, 15, variations, ContentType::Tagline)
    }

    fn script(words: usize) -> String {
        vec!["rich"; words].join(" ")
    }

    fn body(items: serde_json::Value) -> String {
        json!({ "variations": items }).to_string()
    }

    #[test]
    fn test_accepts_valid_payload() {
        let text = body(json!([
            {"tagline": "Savor the Extraordinary", "script": script(30), "cta": "Order today"},
            {"tagline": "Crafted for You", "script": script(30), "cta": "Visit us"}
        ]));
        let variations = parse_variations(&text, &request(2)).unwrap();
        assert_eq!(variations.len(), 2);
        assert_eq!(variations[0].tagline, "Savor the Extraordinary");
    }

    #[test]
    fn test_accepts_fenced_payload() {
        let text = format!(
            "```json\n{}\n```",
            body(json!([{"tagline": "Pure Gold", "script": script(20), "cta": "Taste it"}]))
        );
        assert!(parse_variations(&text, &request(1)).is_ok());
    }

    #[test]
    fn test_rejects_prose() {
        let err = parse_variations("Here is your ad: Buy coffee!", &request(1)).unwrap_err();
        assert!(err.contains("not the expected JSON"));
    }

    #[test]
    fn test_rejects_wrong_count() {
        let text = body(json!([{"tagline": "Pure Gold", "script": script(20), "cta": "Taste it"}]));
        assert_eq!(
            parse_variations(&text, &request(2)).unwrap_err(),
            "expected 2 variations, got 1"
        );
    }

    #[test]
    fn test_rejects_duplicates() {
        let item = json!({"tagline": "Pure Gold", "script": script(20), "cta": "Taste it"});
        let text = body(json!([item.clone(), item]));
        assert!(parse_variations(&text, &request(2)).unwrap_err().contains("duplicates"));
    }

    #[test]
    fn test_enforces_length_bounds() {
        let long_tagline = body(json!([
            {"tagline": script(11), "script": script(20), "cta": "Go"}
        ]));
        assert!(parse_variations(&long_tagline, &request(1)).is_err());

        // 15s spot allows 15..=52 script words.
        let short = body(json!([{"tagline": "Hi", "script": script(14), "cta": "Go"}]));
        assert!(parse_variations(&short, &request(1)).is_err());
        let long = body(json!([{"tagline": "Hi", "script": script(53), "cta": "Go"}]));
        assert!(parse_variations(&long, &request(1)).is_err());
        let edge = body(json!([{"tagline": "Hi", "script": script(52), "cta": "Go"}]));
        assert!(parse_variations(&edge, &request(1)).is_ok());

        let no_cta = body(json!([{"tagline": "Hi", "script": script(20), "cta": "  "}]));
        assert!(parse_variations(&no_cta, &request(1)).unwrap_err().contains("empty cta"));
    }
}

// Prompt construction for ad copy generation
// Author: kelexine (https://github.com/kelexine)

use crate::models::GenerationRequest;

/// Spoken words per second used to size the script.
const WORDS_PER_SECOND: f64 = 2.5;

/// Approximate script length to ask for.
pub fn word_target(request: &GenerationRequest) -> u32 {
    (request.duration_bucket() as f64 * WORDS_PER_SECOND).round() as u32
}

pub fn system_prompt(request: &GenerationRequest) -> String {
    format!(
        r#"You are a world-class copywriter specializing in radio and podcast advertising.
Generate compelling, concise ad copy that drives action.

Tone: {guidance}

IMPORTANT: Respond ONLY with valid JSON in this format, no other text:
{{
  "variations": [
    {{
      "tagline": "1-10 words, memorable and punchy",
      "script": "The full ad script, written to be read aloud",
      "cta": "A strong call-to-action"
    }}
  ]
}}

Requirements:
- Return exactly {count} variation(s), each clearly different from the others
- Tagline must be memorable and brand-building
- Script should be conversational and natural-sounding
- Include a specific, compelling CTA
- Keep sentences short for audio delivery
- Avoid technical jargon unless essential"#,
        guidance = request.tone.guidance(),
        count = request.variations,
    )
}

pub fn user_prompt(request: &GenerationRequest) -> String {
    let duration = request.duration_bucket();
    let mut prompt = format!(
        "Generate {} for:\n\
         Product/Service: {}\n\
         Tone: {}\n\
         Duration: {} seconds (approximately {} words)\n\
         Variations: {}\n",
        request.content_type.describe(),
        request.product.trim(),
        request.tone,
        duration,
        word_target(request),
        request.variations,
    );

    let hints = request.normalized_hints();
    if !hints.is_empty() {
        prompt.push_str("\nAlso:\n");
        for hint in &hints {
            prompt.push_str(&format!("- {}\n", hint));
        }
    }

    if request.time_sensitive {
        prompt.push_str(
            "\nThis is a limited-time promotion: make the offer and its urgency explicit.\n",
        );
    }

    prompt.push_str(
        "\nCreate an ad that would work for radio, podcast, or audio streaming platforms.\n\
         Make it memorable, persuasive, and appropriate for the brand tone.",
    );
    prompt
}

/// Follow-up prompt sent once after a response fails validation.
pub fn repair_prompt(request: &GenerationRequest, problem: &str) -> String {
    let duration = request.duration_bucket();
    format!(
        "{original}\n\n\
         Your previous answer was rejected: {problem}.\n\
         Reply with a single JSON object and nothing else. No prose, no markdown.\n\
         The object must have a \"variations\" array with exactly {count} entries.\n\
         Each entry must have non-empty \"tagline\" (1-10 words), \"script\" ({min}-{max} words) \
         and \"cta\" strings. All entries must differ.",
        original = user_prompt(request),
        problem = problem,
        count = request.variations,
        min = duration,
        max = (duration as f64 * 3.5) as u32,
    )
}

//! Endpoint constants and tunables for the Gemini-backed services.

pub const TEXT_MODEL_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent";
pub const IMAGE_MODEL_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash-image-preview:generateContent";
pub const CHAT_MODEL_ENDPOINT: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-exp:generateContent";

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Uploads larger than this are rejected before any processing.
pub const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024;

pub const THUMBNAIL_SIZE: u32 = 150;
/// Width images are compressed to before chat and mood-analysis uploads.
pub const PREVIEW_WIDTH: u32 = 200;
/// Width images are compressed to before spot-edit uploads.
pub const SPOT_EDIT_WIDTH: u32 = 512;

pub const PROMPT_MIN_LEN: usize = 10;
pub const PROMPT_MAX_LEN: usize = 500;

pub const EXAMPLE_PROMPTS: [&str; 6] = [
    "Replace the sofa with a modern sectional in navy blue",
    "Change the coffee table to a glass-top design",
    "Add a large plant in the corner",
    "Replace the curtains with white blinds",
    "Change the wall color to sage green",
    "Add a bookshelf against the wall",
];

/// Preset ambiances offered by the mood analyzer.
pub const MOOD_OPTIONS: [(&str, &str); 8] = [
    ("cozy", "Comfortable, intimate atmosphere"),
    ("modern", "Clean, minimalist design"),
    ("rustic", "Earthy, organic materials"),
    ("luxurious", "High-end, sophisticated"),
    ("energetic", "Bold colors, dynamic feel"),
    ("peaceful", "Calm, meditative space"),
    ("romantic", "Soft, dreamy atmosphere"),
    ("industrial", "Raw materials, urban edge"),
];

/// Reads the API key from the environment. Empty or placeholder values count
/// as unconfigured.
pub fn api_key_from_env() -> Option<String> {
    match std::env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() && key != "your_api_key_here" => Some(key),
        _ => None,
    }
}

/// Prompt length gate applied before submitting a design request.
pub fn validate_prompt(prompt: &str) -> Result<(), String> {
    let len = prompt.trim().len();
    if len < PROMPT_MIN_LEN {
        return Err(format!(
            "Describe the change in at least {PROMPT_MIN_LEN} characters"
        ));
    }
    if len > PROMPT_MAX_LEN {
        return Err(format!(
            "Keep the description under {PROMPT_MAX_LEN} characters"
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_prompt_rejects_short_input() {
        assert!(validate_prompt("red sofa").is_err());
        assert!(validate_prompt("   ").is_err());
    }

    #[test]
    fn validate_prompt_rejects_oversized_input() {
        let long = "a".repeat(PROMPT_MAX_LEN + 1);
        assert!(validate_prompt(&long).is_err());
    }

    #[test]
    fn validate_prompt_accepts_reasonable_input() {
        assert!(validate_prompt("Replace the sofa with a navy sectional").is_ok());
    }
}

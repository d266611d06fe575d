// Fixed classification prompt and generation settings.

use super::{uniform_safety, BlockThreshold, GenerationParams, SafetySetting};

pub const CLASSIFY_PROMPT: &str = "\
    Identify the manufacturer and model name of the motorcycle in this image. \
    If the image does not show a motorcycle, or the model cannot be determined, say so. \
    Answer with only the manufacturer and model name, or only a short statement that it is unknown. \
    Examples: Yamaha YZF-R1, Yamaha VMAX, Yamaha SR400, unknown, not a motorcycle";

/// Low randomness, short answers.
pub const CLASSIFY_GENERATION: GenerationParams = GenerationParams {
    temperature: 0.2,
    max_output_tokens: 100,
};

pub fn classify_safety() -> Vec<SafetySetting> {
    uniform_safety(BlockThreshold::BlockMediumAndAbove)
}

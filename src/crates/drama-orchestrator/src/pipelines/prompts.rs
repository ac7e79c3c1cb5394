//! Prompt text for the generation pipelines

use serde::{Deserialize, Serialize};

/// Visual settings folded into scene prompts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptSettings {
    /// Art direction for generated backgrounds
    pub style: String,

    /// Target aspect ratio, e.g. "16:9"
    pub image_ratio: String,
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            style: "cinematic, realistic lighting, high detail".to_string(),
            image_ratio: "16:9".to_string(),
        }
    }
}

pub const NOVEL_PARSE_SYSTEM_PROMPT: &str = r#"# Role
You are a professional short-drama screenwriter. Turn the novel text you receive into a tightly paced, highly visual episode plan.

# Instructions
1. Split the story into episodes at natural turning points, conflict peaks or dense stretches of information. Do not split by word count.
2. Cut scenery description, inner monologue and filler transitions. Keep only actions and lines that move the plot.
3. Every episode needs a reversal within its first thirty seconds and ends on a strong hook.
4. Keep the protagonists' personalities faithful to the novel.

# Output format (strict JSON, nothing else)
{
  "episodes": [
    {
      "number": 1,
      "title": "Episode 1: title",
      "conflict": "core conflict of the episode",
      "visuals": ["action beat 1", "action beat 2"],
      "dialogues": [{"role": "Character A", "line": "short, forceful line"}],
      "hook": "the final moment that makes the viewer click next",
      "fullScript": "[Conflict] ...\n[Visuals] ...\n[Dialogue] ...\n[Hook] ..."
    }
  ],
  "hasMore": true,
  "processedCount": 10
}

# Notes
1. fullScript must hold the complete natural-language episode plan (conflict, visuals, dialogue, hook); it is what gets saved.
2. Set hasMore to true when this reply does not contain every episode, false once all episodes are out.
3. processedCount is the number of episodes produced in this reply.
4. Output at most 20 episodes per reply. If more remain, set hasMore to true and wait for the continue request.
5. On a continue request, resume with the episode after the last one you sent, same JSON format."#;

pub const NOVEL_PARSE_CONTINUE_PROMPT: &str =
    "Please continue with the remaining episodes. Same format as before, starting with the episode after the last one you sent.";

pub const BACKGROUND_SYSTEM_PROMPT: &str =
    "You are a production designer for short dramas. You read episode scripts and describe the empty sets they need.";

/// Scene extraction instructions followed by the script
pub fn background_prompt(script: &str, settings: &PromptSettings) -> String {
    format!(
        r#"[Task] Extract every unique scene background from the script below.

[Requirements]
1. Identify each distinct scene (location + time of day combination).
2. Write a detailed English image-generation prompt for each scene.
3. Backgrounds only: no characters, people or actions. State "no people, empty scene" explicitly.
4. Describe setting, time, atmosphere and style.
   - Style: {style}
   - Image ratio: {ratio}

[Output]
Return ONLY a JSON array. Each element has:
- location: the place, e.g. "luxurious office"
- time: the time of day, e.g. "afternoon"
- prompt: the complete image-generation prompt

[Script]
{script}"#,
        style = settings.style,
        ratio = settings.image_ratio,
        script = script,
    )
}

use std::time::Duration;

use reqwest::Client;
use thiserror::Error;

use crate::core::task::Task;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Shown in place of a day plan when the relay fails for any reason.
pub const PLAN_FALLBACK: &str = "Failed to generate plan.";

#[derive(Debug, Error)]
pub enum AiError {
    #[error("no API credential configured")]
    MissingCredential,
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("model API returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("no text in model response")]
    EmptyResponse,
}

/// Thin client for the generative-language API: one round trip per call,
/// bounded timeout, no retry and no streaming. Callers decide what a failure
/// means; this type only reports it.
#[derive(Clone)]
pub struct PlanRelay {
    http: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl PlanRelay {
    /// The credential is checked per call, not here, so a keyless relay can
    /// be constructed and carried around before configuration is complete.
    pub fn new(api_key: Option<String>, model: &str) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
            api_key: api_key.filter(|k| !k.is_empty()),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.to_string(),
        }
    }

    pub fn from_env(model: &str) -> Self {
        Self::new(std::env::var("GEMINI_API_KEY").ok(), model)
    }

    /// Ask the model for a prioritized, time-blocked plan over the given
    /// tasks.
    pub async fn generate_day_plan(&self, tasks: &[Task]) -> Result<String, AiError> {
        self.generate(&day_plan_prompt(tasks)).await
    }

    /// Short supportive reflection on a completed task and its gratitude note.
    pub async fn generate_reflection(
        &self,
        task_text: &str,
        gratitude: &str,
    ) -> Result<String, AiError> {
        self.generate(&reflection_prompt(task_text, gratitude)).await
    }

    async fn generate(&self, prompt: &str) -> Result<String, AiError> {
        let key = self.api_key.as_deref().ok_or(AiError::MissingCredential)?;

        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, key
        );
        let body = serde_json::json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ]
        });

        let resp = self.http.post(&url).json(&body).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let response: serde_json::Value = resp.json().await?;
        extract_text(&response)
    }
}

/// Pull the generated text out of `candidates[0].content.parts[0].text`,
/// shedding markdown code fences if the model wrapped its answer in them.
fn extract_text(response: &serde_json::Value) -> Result<String, AiError> {
    let text = response["candidates"]
        .as_array()
        .and_then(|c| c.first())
        .and_then(|c| c["content"]["parts"].as_array())
        .and_then(|p| p.first())
        .and_then(|p| p["text"].as_str())
        .ok_or(AiError::EmptyResponse)?;

    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix("```markdown")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let inner = inner.strip_suffix("```").unwrap_or(inner).trim();
    if inner.is_empty() {
        return Err(AiError::EmptyResponse);
    }
    Ok(inner.to_string())
}

fn day_plan_prompt(tasks: &[Task]) -> String {
    let mut prompt = String::from(
        "You are an AI personal productivity planner. Analyze the tasks:\n\n",
    );
    for task in tasks {
        prompt.push_str(&format!(
            "- text: {}\n  status: {}\n  due: {}\n  priority: {}\n",
            task.text,
            task.status.as_str(),
            task.due.format("%Y-%m-%d %H:%M"),
            task.priority.as_str(),
        ));
        if let Some(reminder) = &task.reminder {
            prompt.push_str(&format!(
                "  reminder: {} minutes before\n",
                reminder.lead_minutes()
            ));
        }
    }
    prompt.push_str(
        "\nCreate a clear, actionable daily plan:\n\
         1. Sorted by urgency (deadline)\n\
         2. Consider priority levels (HIGH, MEDIUM, LOW)\n\
         3. Split into Morning / Afternoon / Evening schedule\n\
         4. Add small motivational notes\n\
         5. Keep plan short and practical.\n\n\
         Provide response in markdown.\n",
    );
    prompt
}

fn reflection_prompt(task_text: &str, gratitude: &str) -> String {
    format!(
        "You are a warm, friendly personal growth coach.\n\
         The user completed a task and wrote their gratitude/reflection.\n\n\
         Your job:\n\
         - Write 2 to 3 sentences.\n\
         - Use plain text only (not markdown).\n\
         - Keep it supportive, empathetic, and encouraging.\n\
         - Mention the task subtly.\n\
         - Reflect on the gratitude they expressed.\n\
         - Suggest one small next step.\n\
         - Include exactly one uplifting emoji at the end.\n\
         - DO NOT ask questions.\n\
         - DO NOT repeat their gratitude.\n\n\
         Task: {task_text}\n\
         User Gratitude: {gratitude}\n\n\
         Write the reflection now:\n"
    )
}

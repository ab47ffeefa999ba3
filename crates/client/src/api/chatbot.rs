//! Patient assistant endpoints.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{ApiClient, ApiError};

#[derive(Serialize)]
struct PromptRequest<'a> {
    prompt: &'a str,
}

#[derive(Deserialize)]
struct AskResponse {
    response: String,
}

/// `questions` arrives as a list or as one newline-separated string.
#[derive(Deserialize)]
#[serde(untagged)]
enum Questions {
    List(Vec<String>),
    Text(String),
}

#[derive(Deserialize)]
struct SuggestResponse {
    questions: Questions,
}

impl Questions {
    fn into_list(self) -> Vec<String> {
        match self {
            Self::List(items) => items
                .into_iter()
                .map(|q| q.trim().to_string())
                .filter(|q| !q.is_empty())
                .collect(),
            // Some model replies carry escaped newlines.
            Self::Text(text) => text
                .replace("\\n", "\n")
                .lines()
                .map(strip_enumeration)
                .filter(|q| !q.is_empty())
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// Drop a leading `1.`, `2)` or `-` marker.
fn strip_enumeration(line: &str) -> &str {
    let line = line.trim();
    let rest = line.trim_start_matches(|c: char| c.is_ascii_digit());
    let rest = if rest.len() < line.len() {
        rest.strip_prefix(['.', ')']).unwrap_or(rest)
    } else {
        rest.strip_prefix(['-', '*', '•']).unwrap_or(rest)
    };
    rest.trim()
}

/// Chatbot endpoints (patient only).
#[derive(Debug, Clone, Copy)]
pub struct ChatbotApi<'a> {
    client: &'a ApiClient,
}

impl<'a> ChatbotApi<'a> {
    pub(crate) const fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// Ask a free-form question.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self, prompt), fields(prompt_len = prompt.len()))]
    pub async fn ask(&self, prompt: &str) -> Result<String, ApiError> {
        let response: AskResponse = self
            .client
            .post("/chatbot/ask", &PromptRequest { prompt })
            .await?;
        Ok(response.response)
    }

    /// Follow-up questions for the patient's latest prescription.
    ///
    /// # Errors
    ///
    /// Returns `ApiError` on transport failure or rejection.
    #[instrument(skip(self))]
    pub async fn suggest_questions(&self) -> Result<Vec<String>, ApiError> {
        let response: SuggestResponse = self
            .client
            .post_query("/chatbot/suggest_questions", &[])
            .await?;
        Ok(response.questions.into_list())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Vec<String> {
        serde_json::from_str::<SuggestResponse>(json)
            .unwrap()
            .questions
            .into_list()
    }

    #[test]
    fn test_questions_as_list() {
        assert_eq!(
            parse(r#"{"questions": [" Should I take it with food? ", ""]}"#),
            vec!["Should I take it with food?"]
        );
    }

    #[test]
    fn test_questions_as_numbered_text() {
        let questions = parse(
            r#"{"questions": "1. How long should I continue?\n\n2) Any side effects?\\n- Can I drive?"}"#,
        );
        assert_eq!(
            questions,
            vec![
                "How long should I continue?",
                "Any side effects?",
                "Can I drive?"
            ]
        );
    }

    #[test]
    fn test_strip_enumeration_keeps_plain_lines() {
        assert_eq!(strip_enumeration("  What dose? "), "What dose?");
        assert_eq!(strip_enumeration("10. Tenth"), "Tenth");
    }
}

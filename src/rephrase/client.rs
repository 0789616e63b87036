/// Rephrasing collaborator
/// Rewrites a task instruction into a playful bilingual game line through an
/// Azure OpenAI chat-completions deployment.
use crate::config::loader::RephraseSettings;
use crate::config::types::{GraderError, Result};
use serde_json::{json, Value};
use std::time::Duration;

const SYSTEM_PROMPT: &str = "You are a Microsoft Azure game dialogue designer,Good at designing lively and interesting dialogue.\
You only reply to instruction to ask the player setup something in Microsoft Azure.";

const REWRITE_RULES: &str = "You need to help me rewrite a sentence with the following rule:\
1. Keep all technical teams and Noun. \
2. It is instructions to ask player to complete tasks.\
3. In a funny style to the brave (勇者) with some emojis\
4. In both English and Traditional Chinese.\
5. English goes first, and Chinese goes next.\
6. Only reply to the rewritten sentence, and don't answer anything else.";

/// Anything that can rewrite a sentence. `variant` selects one of several
/// cached phrasings of the same sentence.
pub trait Rephraser: Send + Sync {
    fn rephrase(&self, text: &str, variant: u8) -> Result<String>;
}

#[derive(Clone)]
pub struct AzureOpenAiRephraser {
    agent: ureq::Agent,
    url: String,
    api_key: String,
}

impl AzureOpenAiRephraser {
    pub fn new(
        endpoint: &str,
        api_key: &str,
        deployment: &str,
        api_version: &str,
        timeout: Duration,
    ) -> Self {
        let url = format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint.trim_end_matches('/'),
            deployment,
            api_version
        );
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();

        Self {
            agent,
            url,
            api_key: api_key.to_string(),
        }
    }

    /// `None` unless endpoint, key and deployment are all configured
    pub fn from_settings(settings: &RephraseSettings) -> Option<Self> {
        match (&settings.endpoint, &settings.api_key, &settings.deployment) {
            (Some(endpoint), Some(api_key), Some(deployment)) => Some(Self::new(
                endpoint,
                api_key,
                deployment,
                &settings.api_version,
                Duration::from_millis(settings.request_timeout_ms),
            )),
            _ => None,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn request_body(text: &str) -> Value {
        json!({
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                {
                    "role": "user",
                    "content": format!("{}Rewrite the following sentence:\n\n\n{}\n", REWRITE_RULES, text),
                },
            ],
            "temperature": 0.9,
            "max_tokens": 800,
            "top_p": 0.95,
            "frequency_penalty": 0,
            "presence_penalty": 0,
        })
    }
}

/// First choice's message content from a chat-completions response
fn extract_content(body: &Value) -> Result<String> {
    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| GraderError::Rephrase("response carries no message content".to_string()))
}

impl Rephraser for AzureOpenAiRephraser {
    fn rephrase(&self, text: &str, _variant: u8) -> Result<String> {
        let response = self
            .agent
            .post(&self.url)
            .set("content-type", "application/json")
            .set("api-key", &self.api_key)
            .send_json(Self::request_body(text));

        match response {
            Ok(response) => {
                let body: Value = response
                    .into_json()
                    .map_err(|e| GraderError::Rephrase(format!("invalid response body: {e}")))?;
                extract_content(&body)
            }
            Err(ureq::Error::Status(code, _)) => {
                Err(GraderError::Rephrase(format!("http status {code}")))
            }
            Err(ureq::Error::Transport(err)) => Err(GraderError::Rephrase(format!(
                "http transport failure: {err}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let client = AzureOpenAiRephraser::new(
            "https://demo.openai.azure.com/",
            "key",
            "gpt-35",
            "2024-02-01",
            Duration::from_secs(1),
        );
        assert_eq!(
            client.url(),
            "https://demo.openai.azure.com/openai/deployments/gpt-35/chat/completions?api-version=2024-02-01"
        );
    }

    #[test]
    fn test_from_settings_requires_all_values() {
        let mut settings = RephraseSettings::default();
        assert!(AzureOpenAiRephraser::from_settings(&settings).is_none());

        settings.endpoint = Some("https://demo.openai.azure.com".to_string());
        settings.api_key = Some("key".to_string());
        assert!(AzureOpenAiRephraser::from_settings(&settings).is_none());

        settings.deployment = Some("gpt-35".to_string());
        assert!(AzureOpenAiRephraser::from_settings(&settings).is_some());
    }

    #[test]
    fn test_request_body_carries_sentence_and_sampling() {
        let body = AzureOpenAiRephraser::request_body("Create a resource group.");
        assert_eq!(body["messages"][0]["role"], "system");
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.ends_with("Create a resource group.\n"));
        assert!(user.contains("Traditional Chinese"));
        assert_eq!(body["max_tokens"], 800);
    }

    #[test]
    fn test_extract_content() {
        let body = json!({"choices": [{"message": {"role": "assistant", "content": "Hi brave one"}}]});
        assert_eq!(extract_content(&body).unwrap(), "Hi brave one");
        assert!(extract_content(&json!({"choices": []})).is_err());
    }

    #[test]
    fn test_unreachable_endpoint_is_rephrase_error() {
        let client = AzureOpenAiRephraser::new(
            "http://127.0.0.1:1",
            "key",
            "gpt-35",
            "2024-02-01",
            Duration::from_secs(2),
        );
        assert!(matches!(
            client.rephrase("text", 1),
            Err(GraderError::Rephrase(_))
        ));
    }
}

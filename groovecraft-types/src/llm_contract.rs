//! Request/response contract for the LLM-assist collaborator (§6.3). The
//! HTTP endpoint, its streaming transport, and the system prompt are all
//! out of scope here — this module only gives a future host a shared set
//! of plain data types to serialize over the wire.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Openai,
    Anthropic,
    Gemini,
}

/// Body of the assist endpoint's POST request. `current_pattern`, when
/// present, is the DSL source text of the pattern currently loaded in the
/// editor; a host wraps the last `User` message with "modify this pattern
/// in place" instructions before forwarding to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmAssistRequest {
    pub messages: Vec<ChatMessage>,
    pub provider: LlmProvider,
    pub current_pattern: Option<String>,
}

/// One Server-Sent Event from the assist endpoint's response stream.
/// `Done` corresponds to the wire sentinel `[DONE]`; everything before it
/// is a `Chunk` carrying the next slice of the model's streamed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LlmStreamEvent {
    Chunk { content: String },
    Done,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_round_trips_through_json() {
        let request = LlmAssistRequest {
            messages: vec![ChatMessage {
                role: ChatRole::User,
                content: "make this groove swing harder".to_string(),
            }],
            provider: LlmProvider::Anthropic,
            current_pattern: Some("TEMPO 120\nseq kick: x...\n".to_string()),
        };
        let json = serde_json::to_string(&request).expect("serialize");
        let back: LlmAssistRequest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, request);
    }

    #[test]
    fn stream_event_chunk_carries_content() {
        let event = LlmStreamEvent::Chunk {
            content: "seq snare:".to_string(),
        };
        let json = serde_json::to_string(&event).expect("serialize");
        assert!(json.contains("seq snare:"));
    }

    #[test]
    fn stream_event_done_has_no_content_field() {
        let json = serde_json::to_string(&LlmStreamEvent::Done).expect("serialize");
        let back: LlmStreamEvent = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, LlmStreamEvent::Done);
    }
}

//! Conversation items.

use serde::{Deserialize, Serialize};

/// An entry in the conversation: a message, a function call or its output.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConversationItem {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// `message`, `function_call` or `function_call_output`.
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<ContentPart>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ConversationItem {
    /// A user message with the given content parts.
    pub fn user_message(content: Vec<ContentPart>) -> Self {
        Self {
            item_type: "message".to_string(),
            role: Some("user".to_string()),
            content: Some(content),
            ..Default::default()
        }
    }

    pub fn function_call_output(call_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            item_type: "function_call_output".to_string(),
            call_id: Some(call_id.into()),
            output: Some(output.into()),
            ..Default::default()
        }
    }

    pub fn is_function_call(&self) -> bool {
        self.item_type == "function_call"
    }
}

/// A single content part of a message item.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ContentPart {
    /// `input_text`, `input_audio`, `input_image`, `text` or `audio`.
    #[serde(rename = "type")]
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ContentPart {
    pub fn input_text(text: impl Into<String>) -> Self {
        Self {
            content_type: "input_text".to_string(),
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// An image given as a data URL, sent at `high` detail.
    pub fn input_image(data_url: impl Into<String>) -> Self {
        Self {
            content_type: "input_image".to_string(),
            image_url: Some(data_url.into()),
            detail: Some("high".to_string()),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_message_with_image() {
        let item = ConversationItem::user_message(vec![
            ContentPart::input_image("data:image/png;base64,AAAA"),
            ContentPart::input_text("Please describe this image."),
        ]);
        assert_eq!(
            serde_json::to_value(&item).unwrap(),
            json!({
                "type": "message",
                "role": "user",
                "content": [
                    {"type": "input_image", "image_url": "data:image/png;base64,AAAA", "detail": "high"},
                    {"type": "input_text", "text": "Please describe this image."}
                ]
            })
        );
    }

    #[test]
    fn test_function_call_item_parses() {
        let item: ConversationItem = serde_json::from_value(json!({
            "id": "item_1",
            "type": "function_call",
            "call_id": "call_9",
            "name": "get_weather",
            "arguments": "{\"city\":\"La Orotava\"}"
        }))
        .unwrap();
        assert!(item.is_function_call());
        assert_eq!(item.name.as_deref(), Some("get_weather"));
        assert!(item.content.is_none());
    }
}

use openai_realtime_types::{InputAudioTranscription, SessionConfig, ToolDef, TurnDetection};
use secrecy::SecretString;

pub const OPENAI_REALTIME_URL: &str = "wss://api.openai.com/v1/realtime";

/// Everything needed to open and configure a realtime session.
#[derive(Debug)]
pub struct RealtimeConfig {
    pub api_key: SecretString,
    pub url: String,
    pub model: String,
    /// Name reported in `agent_start` / `agent_end` events.
    pub agent_name: String,
    pub instructions: String,
    pub voice: String,
    pub speed: f32,
    pub transcription_model: String,
    pub transcription_language: Option<String>,
    pub turn_detection: TurnDetection,
}

impl RealtimeConfig {
    pub fn new(api_key: SecretString, agent_name: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            api_key,
            url: OPENAI_REALTIME_URL.to_string(),
            model: "gpt-realtime".to_string(),
            agent_name: agent_name.into(),
            instructions: instructions.into(),
            voice: "marin".to_string(),
            speed: 1.0,
            transcription_model: "gpt-4o-mini-transcribe".to_string(),
            transcription_language: Some("es".to_string()),
            turn_detection: TurnDetection::SemanticVad {
                eagerness: Some("auto".to_string()),
                create_response: Some(true),
                interrupt_response: Some(true),
            },
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}?model={}", self.url, self.model)
    }

    /// The `session.update` payload, with the given tools advertised.
    pub fn session_config(&self, tools: Vec<ToolDef>) -> SessionConfig {
        SessionConfig {
            model: Some(self.model.clone()),
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            instructions: Some(self.instructions.clone()),
            voice: Some(self.voice.clone()),
            speed: Some(self.speed),
            input_audio_format: Some("pcm16".to_string()),
            output_audio_format: Some("pcm16".to_string()),
            input_audio_transcription: Some(InputAudioTranscription {
                model: self.transcription_model.clone(),
                language: self.transcription_language.clone(),
                prompt: None,
            }),
            turn_detection: Some(self.turn_detection.clone()),
            tool_choice: (!tools.is_empty()).then(|| "auto".to_string()),
            tools: (!tools.is_empty()).then_some(tools),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RealtimeConfig {
        RealtimeConfig::new(SecretString::from("sk-test".to_string()), "eladia-npc", "Be kind.")
    }

    #[test]
    fn test_endpoint_includes_model() {
        assert_eq!(
            config().endpoint(),
            "wss://api.openai.com/v1/realtime?model=gpt-realtime"
        );
    }

    #[test]
    fn test_session_config_defaults() {
        let session = config().session_config(vec![]);
        assert_eq!(session.voice.as_deref(), Some("marin"));
        assert_eq!(session.input_audio_format.as_deref(), Some("pcm16"));
        assert_eq!(
            session.input_audio_transcription.unwrap().model,
            "gpt-4o-mini-transcribe"
        );
        assert!(session.tools.is_none());
        assert!(session.tool_choice.is_none());
    }

    #[test]
    fn test_session_config_with_tools() {
        let tool = ToolDef::function("get_weather", None, serde_json::json!({"type": "object"}));
        let session = config().session_config(vec![tool]);
        assert_eq!(session.tools.unwrap().len(), 1);
        assert_eq!(session.tool_choice.as_deref(), Some("auto"));
    }
}

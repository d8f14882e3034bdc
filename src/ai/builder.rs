use crate::models::{self, ModelProfile};
use crate::types::{
    ChatRequest, ContentPart, ConversationTurn, MessageContent, Role, SamplingParams,
};

/// Fixed opening turn of every conversation.
pub const SYSTEM_PROMPT: &str = "Hello Ellie. How can I help you?";

/// Prompt used when images are sent without any text.
pub const DEFAULT_IMAGE_PROMPT: &str = "What is this image?";

/// Images embedded in a primary request; the rest stay in the transcript only.
pub const MAX_PRIMARY_IMAGES: usize = 4;

/// What the user typed and attached for one send.
#[derive(Clone, Copy, Debug)]
pub struct UserInput<'a> {
    pub text: &'a str,
    /// Data URIs (or remote URLs), in the order the user attached them.
    pub images: &'a [String],
}

impl<'a> UserInput<'a> {
    pub fn new(text: &'a str, images: &'a [String]) -> Self {
        Self { text, images }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.images.is_empty()
    }
}

/// Stateless builder for `/chat/completions` bodies.
#[derive(Clone, Copy, Debug)]
pub struct ChatRequestBuilder {
    profile: &'static ModelProfile,
}

impl ChatRequestBuilder {
    /// Unknown ids fall back to [`models::DEFAULT_MODEL_ID`].
    pub fn new(model_id: &str) -> Self {
        Self {
            profile: models::resolve(model_id),
        }
    }

    pub fn profile(&self) -> &'static ModelProfile {
        self.profile
    }

    /// Primary request: up to [`MAX_PRIMARY_IMAGES`] images when the model
    /// has vision, text only otherwise.
    pub fn build(&self, input: UserInput<'_>, history: &[ConversationTurn]) -> ChatRequest {
        let text = input.text;
        let user = if self.profile.supports_vision && !input.images.is_empty() {
            if input.images.len() > MAX_PRIMARY_IMAGES {
                tracing::debug!(
                    attached = input.images.len(),
                    sent = MAX_PRIMARY_IMAGES,
                    "capping images in primary request"
                );
            }
            let images = &input.images[..input.images.len().min(MAX_PRIMARY_IMAGES)];
            vision_turn(images, image_prompt(text))
        } else {
            if !input.images.is_empty() {
                tracing::debug!(
                    model = self.profile.id,
                    "model has no vision support, images left out of request"
                );
            }
            ConversationTurn::user(text)
        };

        self.assemble(history, user)
    }

    /// Reduced request sent after a multi-image primary request fails: only
    /// the first image, plus a note saying how many were attached.
    ///
    /// `None` unless the primary request embedded more than one image, which
    /// needs a vision model and at least two attachments.
    pub fn build_fallback(
        &self,
        input: UserInput<'_>,
        history: &[ConversationTurn],
    ) -> Option<ChatRequest> {
        if !self.profile.supports_vision || input.images.len() < 2 {
            return None;
        }
        let first = &input.images[0];

        let text = format!(
            "{}\n\n[Note: Due to request size limits, only the first image is attached. {} images were provided.]",
            image_prompt(input.text),
            input.images.len()
        );
        Some(self.assemble(history, vision_turn(std::slice::from_ref(first), text)))
    }

    fn assemble(&self, history: &[ConversationTurn], user: ConversationTurn) -> ChatRequest {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ConversationTurn::system(SYSTEM_PROMPT));
        messages.extend_from_slice(history);
        messages.push(user);

        ChatRequest {
            messages,
            model: self.profile.backend_name.to_string(),
            sampling: SamplingParams::default(),
            stream: false,
        }
    }
}

/// Free-function form of [`ChatRequestBuilder::build`].
pub fn build(
    text: &str,
    images: &[String],
    history: &[ConversationTurn],
    model_id: &str,
) -> ChatRequest {
    ChatRequestBuilder::new(model_id).build(UserInput::new(text, images), history)
}

fn image_prompt(text: &str) -> String {
    if text.trim().is_empty() {
        DEFAULT_IMAGE_PROMPT.to_string()
    } else {
        text.to_string()
    }
}

fn vision_turn(images: &[String], text: String) -> ConversationTurn {
    let mut parts: Vec<ContentPart> = images.iter().map(ContentPart::image).collect();
    parts.push(ContentPart::text(text));
    ConversationTurn {
        role: Role::User,
        content: MessageContent::Parts(parts),
    }
}

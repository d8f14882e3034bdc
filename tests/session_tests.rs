//! Integration tests for the chat session: transcript, persistence and errors

use async_trait::async_trait;
use nebula_chat::ai::{ChatError, DEFAULT_IMAGE_PROMPT, NebulaClient, Transport, TransportError};
use nebula_chat::config::Config;
use nebula_chat::history::ChatHistory;
use nebula_chat::session::{APOLOGY_REPLY, ChatSession};
use nebula_chat::storage::{self, Store};
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

struct ScriptedTransport {
    replies: Mutex<VecDeque<Result<Value, TransportError>>>,
    posts: Mutex<Vec<Value>>,
}

impl ScriptedTransport {
    fn new(replies: Vec<Result<Value, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            posts: Mutex::new(Vec::new()),
        })
    }

    fn posts(&self) -> Vec<Value> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post(&self, _path: &str, body: &Value) -> Result<Value, TransportError> {
        self.posts.lock().unwrap().push(body.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::Other("no scripted reply".into())))
    }

    async fn get(&self, path: &str) -> Result<Value, TransportError> {
        match path {
            "/models" => Ok(json!({"data": [{"id": "openai/gpt-4o-mini"}]})),
            _ => Err(TransportError::NoResponse),
        }
    }
}

fn ok_reply(text: &str) -> Result<Value, TransportError> {
    Ok(json!({"choices": [{"message": {"content": text}}]}))
}

fn session_with(
    dir: &tempfile::TempDir,
    model_id: &str,
    transport: Arc<ScriptedTransport>,
) -> ChatSession {
    let config = Config {
        api_key: Some("sk-test".to_string()),
        model_id: model_id.to_string(),
        ..Config::default()
    };
    let client = NebulaClient::new(transport);
    ChatSession::with_client(config, Store::new(dir.path()), Some(client))
}

mod send_tests {
    use super::*;

    #[tokio::test]
    async fn test_reply_is_recorded_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new(vec![ok_reply("Hi there"), ok_reply("Again")]);
        let mut session = session_with(&dir, "deepseek-v3-0324", transport.clone());

        let reply = session.send("Hello", vec![]).await.unwrap();
        assert_eq!(reply, "Hi there");

        session.send("Once more", vec![]).await.unwrap();

        // Second request carries the first exchange as history.
        let second = &transport.posts()[1];
        let messages = second["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1]["content"], "Hello");
        assert_eq!(messages[2]["role"], "assistant");
        assert_eq!(messages[2]["content"], "Hi there");
        assert_eq!(messages[3]["content"], "Once more");

        let reloaded = ChatHistory::load(&Store::new(dir.path()));
        assert_eq!(reloaded.len(), 4);
        assert!(reloaded.messages()[0].is_user);
        assert_eq!(reloaded.messages()[3].content, "Again");
    }

    #[tokio::test]
    async fn test_empty_message_is_rejected_before_sending() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new(vec![]);
        let mut session = session_with(&dir, "gpt-4o-mini", transport.clone());

        let err = session.send("   ", vec![]).await.unwrap_err();
        assert_eq!(err, ChatError::EmptyMessage);
        assert!(transport.posts().is_empty());
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_failure_appends_apology() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new(vec![Err(TransportError::Server {
            status: 429,
            body: String::new(),
        })]);
        let mut session = session_with(&dir, "gpt-4o-mini", transport);

        let err = session.send("Hello", vec![]).await.unwrap_err();
        assert_eq!(err, ChatError::RateLimited);
        assert_eq!(err.to_string(), "Too many requests, please try again later");

        let messages = session.history().messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, APOLOGY_REPLY);
        assert!(!messages[1].is_user);
    }

    #[tokio::test]
    async fn test_fallback_reply_gets_note() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Server {
                status: 413,
                body: String::new(),
            }),
            ok_reply("Looks like a dog"),
        ]);
        let mut session = session_with(&dir, "qwen2.5-vl-7b", transport.clone());
        let images: Vec<String> = (0..3).map(|i| format!("data:image/png;base64,{i}")).collect();

        let reply = session.send("", images.clone()).await.unwrap();
        assert!(reply.starts_with("[Note: Due to request size limits"));
        assert!(reply.contains("3 images were provided."));
        assert!(reply.ends_with("Looks like a dog"));
        assert_eq!(transport.posts().len(), 2);

        // The transcript keeps every image even though one was sent.
        assert_eq!(session.history().messages()[0].images, images);
    }

    #[tokio::test]
    async fn test_text_only_model_reply_has_no_image_note() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new(vec![ok_reply("Plain answer")]);
        let mut session = session_with(&dir, "deepseek-v3-0324", transport.clone());
        let images: Vec<String> = (0..3).map(|i| format!("data:image/png;base64,{i}")).collect();

        let reply = session.send("What now?", images).await.unwrap();
        assert_eq!(reply, "Plain answer");
        assert!(!reply.contains("first image only"));
        assert_eq!(transport.posts().len(), 1);
    }

    #[tokio::test]
    async fn test_text_only_model_failure_is_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new(vec![
            Err(TransportError::Server {
                status: 500,
                body: String::new(),
            }),
            ok_reply("unused"),
        ]);
        let mut session = session_with(&dir, "deepseek-r1-0528", transport.clone());
        let images: Vec<String> = (0..2).map(|i| format!("data:image/png;base64,{i}")).collect();

        let err = session.send("hi", images).await.unwrap_err();
        assert_eq!(err, ChatError::Server { status: 500 });
        assert_eq!(transport.posts().len(), 1);
        assert_eq!(session.history().messages()[1].content, APOLOGY_REPLY);
    }

    #[tokio::test]
    async fn test_images_without_text_use_default_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new(vec![ok_reply("A red bicycle")]);
        let mut session = session_with(&dir, "gpt-4o-mini", transport.clone());
        let images = vec!["data:image/png;base64,AA".to_string()];

        let reply = session.send("", images.clone()).await.unwrap();
        assert_eq!(reply, "A red bicycle");

        let posts = transport.posts();
        assert_eq!(posts.len(), 1);
        let parts = posts[0]["messages"][1]["content"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["image_url"]["url"], "data:image/png;base64,AA");
        assert_eq!(parts[1]["text"], DEFAULT_IMAGE_PROMPT);

        let stored = &session.history().messages()[0];
        assert!(stored.content.is_empty());
        assert_eq!(stored.images, images);
    }

    #[tokio::test]
    async fn test_past_images_are_not_resent() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new(vec![ok_reply("one"), ok_reply("two")]);
        let mut session = session_with(&dir, "gpt-4o-mini", transport.clone());

        session
            .send("look", vec!["data:image/png;base64,AA".to_string()])
            .await
            .unwrap();
        session.send("and now?", vec![]).await.unwrap();

        let second = &transport.posts()[1];
        assert_eq!(second["messages"][1]["content"], "look");
    }

    #[tokio::test]
    async fn test_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = ChatSession::with_client(Config::default(), Store::new(dir.path()), None);

        assert!(!session.has_api_key());
        let err = session.send("hi", vec![]).await.unwrap_err();
        assert_eq!(err, ChatError::MissingApiKey);
    }
}

mod settings_tests {
    use super::*;

    #[test]
    fn test_set_model_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(&dir, "gpt-4o-mini", ScriptedTransport::new(vec![]));

        let profile = session.set_model("deepseek-r1-0528").unwrap();
        assert_eq!(profile.backend_name, "deepseek-ai/DeepSeek-R1-0528");
        assert_eq!(session.current_model().id, "deepseek-r1-0528");

        let store = Store::new(dir.path());
        assert_eq!(
            store.get(storage::SELECTED_MODEL).as_deref(),
            Some("deepseek-r1-0528")
        );
    }

    #[test]
    fn test_set_unknown_model_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = session_with(&dir, "gpt-4o-mini", ScriptedTransport::new(vec![]));

        let err = session.set_model("gpt-9").unwrap_err();
        assert!(err.to_string().contains("qwen2.5-vl-7b"));
        assert_eq!(session.current_model().id, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_clear_api_key_clears_history() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new(vec![ok_reply("hey")]);
        let mut session = session_with(&dir, "gpt-4o-mini", transport);
        session.send("hi", vec![]).await.unwrap();

        session.clear_api_key().unwrap();

        let store = Store::new(dir.path());
        assert!(!session.has_api_key());
        assert!(session.history().is_empty());
        assert!(store.get(storage::API_KEY).is_none());
        assert!(store.get(storage::CHAT_HISTORY).is_none());
    }

    #[test]
    fn test_set_api_key() {
        let dir = tempfile::tempdir().unwrap();
        let mut session =
            ChatSession::with_client(Config::default(), Store::new(dir.path()), None);

        assert!(session.set_api_key("  ").is_err());
        session.set_api_key("sk-new").unwrap();
        assert!(session.has_api_key());
        assert_eq!(session.config().api_key.as_deref(), Some("sk-new"));
        assert_eq!(
            Store::new(dir.path()).get(storage::API_KEY).as_deref(),
            Some("sk-new")
        );
    }

    #[tokio::test]
    async fn test_export() {
        let dir = tempfile::tempdir().unwrap();
        let transport = ScriptedTransport::new(vec![ok_reply("hey")]);
        let mut session = session_with(&dir, "gpt-4o-mini", transport);
        session.send("hi", vec![]).await.unwrap();

        let out = tempfile::tempdir().unwrap();
        let path = session.export_history(out.path()).unwrap();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        assert!(name.starts_with("chat-history-") && name.ends_with(".json"));

        let value: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["messages"].as_array().unwrap().len(), 2);
    }
}

mod client_tests {
    use super::*;

    #[tokio::test]
    async fn test_connection_and_models() {
        let client = NebulaClient::new(ScriptedTransport::new(vec![]));
        assert!(client.test_connection().await);

        let models = client.list_models().await.unwrap();
        assert_eq!(models["data"][0]["id"], "openai/gpt-4o-mini");

        let err = client.user_info().await.unwrap_err();
        assert_eq!(err, ChatError::NoConnection);
    }
}

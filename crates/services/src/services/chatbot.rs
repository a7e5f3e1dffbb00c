//! Retrieval-augmented chat: embed the question, pull matching document
//! chunks into the system prompt, then relay Ollama's answer.

use bytes::Bytes;
use db::{
    DBService,
    models::{
        conversation::Conversation,
        document_chunk::DocumentChunk,
        message::{ChatMessage, MessageRole},
    },
};
use futures::{StreamExt, stream::BoxStream};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info, warn};

use super::{
    config::RagConfig,
    ollama::{ChatTurn, OllamaClient, OllamaError, message_content},
    retrieval::{rank_chunks, select_context},
};

#[derive(Debug, Error)]
pub enum ChatbotError {
    #[error("Question manquante")]
    MissingQuestion,
    #[error(transparent)]
    Ollama(#[from] OllamaError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Body of a chatbot call; the GET form only supplies `question`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatbotRequest {
    #[serde(default)]
    pub conversation_id: Option<i64>,
    #[serde(default)]
    pub messages: Vec<ChatTurn>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub options: Option<Value>,
    #[serde(default)]
    pub question: Option<String>,
}

impl ChatbotRequest {
    /// The last user turn, falling back to the `question` field
    pub fn question(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|turn| turn.role == "user")
            .map(|turn| turn.content.as_str())
            .or(self.question.as_deref())
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }
}

/// Messages ready to send upstream, plus where to store the reply
#[derive(Debug, Clone)]
pub struct PreparedChat {
    pub messages: Vec<ChatTurn>,
    pub conversation_id: Option<i64>,
    pub stream: bool,
    pub options: Option<Value>,
}

pub fn rag_instructions(context: &str) -> String {
    format!(
        "### INFORMATIONS IMPORTANTES (À UTILISER EN PRIORITÉ) :\n{context}\n\n\
         RÈGLES POUR TA RÉPONSE :\n\
         - Si la réponse est dans les INFORMATIONS ci-dessus, tu DOIS l'utiliser.\n\
         - Ne dis pas 'Je vais chercher sur le site' ou 'D'après mes recherches'. Réponds directement.\n\
         - Si l'info n'est pas là, dis : 'Nos documents ne précisent pas cela, mais en général...'"
    )
}

/// Merge the instructions into a leading system turn, or add one
pub fn inject_instructions(mut messages: Vec<ChatTurn>, instructions: String) -> Vec<ChatTurn> {
    match messages.first_mut() {
        Some(first) if first.role == "system" => {
            first.content = format!("{}\n\n{}", first.content, instructions);
        }
        _ => messages.insert(0, ChatTurn::system(instructions)),
    }
    messages
}

/// Collects `message.content` from an NDJSON byte stream split at arbitrary points
#[derive(Debug, Default)]
pub struct NdjsonAccumulator {
    pending: Vec<u8>,
    content: String,
}

impl NdjsonAccumulator {
    pub fn push(&mut self, chunk: &[u8]) {
        self.pending.extend_from_slice(chunk);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.consume_line(&line);
        }
    }

    /// Flush a trailing line that had no newline
    pub fn finish(&mut self) {
        let rest = std::mem::take(&mut self.pending);
        self.consume_line(&rest);
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    fn consume_line(&mut self, line: &[u8]) {
        let line = line.trim_ascii();
        if line.is_empty() {
            return;
        }
        match serde_json::from_slice::<Value>(line) {
            Ok(value) => {
                if let Some(piece) = message_content(&value) {
                    self.content.push_str(piece);
                }
            }
            Err(e) => debug!(error = %e, "skipping undecodable ndjson line"),
        }
    }
}

#[derive(Clone)]
pub struct ChatbotService {
    db: DBService,
    ollama: OllamaClient,
    rag: RagConfig,
}

impl ChatbotService {
    pub fn new(db: DBService, ollama: OllamaClient, rag: RagConfig) -> Self {
        Self { db, ollama, rag }
    }

    /// Embed the question, rank every stored chunk and build the upstream messages
    pub async fn prepare(&self, request: ChatbotRequest) -> Result<PreparedChat, ChatbotError> {
        let question = request
            .question()
            .ok_or(ChatbotError::MissingQuestion)?
            .to_string();

        let query = self.ollama.embeddings(&question).await?;
        let chunks = DocumentChunk::find_all(&self.db.pool).await?;
        let ranked = rank_chunks(&query, chunks);
        let context = select_context(&ranked, self.rag);

        let ChatbotRequest {
            conversation_id,
            mut messages,
            stream,
            options,
            ..
        } = request;

        // GET callers send no history, only the question
        if !messages.iter().any(|turn| turn.role == "user") {
            messages.push(ChatTurn::new("user", question));
        }

        Ok(PreparedChat {
            messages: inject_instructions(messages, rag_instructions(&context)),
            conversation_id,
            stream,
            options,
        })
    }

    /// Single-shot completion. Returns Ollama's body untouched.
    pub async fn complete(
        &self,
        chat: PreparedChat,
        caller_id: Option<i64>,
    ) -> Result<Bytes, ChatbotError> {
        let body = self
            .ollama
            .chat(&chat.messages, chat.options.as_ref())
            .await?;

        let reply = serde_json::from_slice::<Value>(&body)
            .ok()
            .and_then(|value| message_content(&value).map(str::to_string))
            .unwrap_or_default();
        self.persist_reply(chat.conversation_id, caller_id, &reply)
            .await;

        Ok(body)
    }

    /// Streamed completion. Upstream bytes are forwarded as they arrive; once
    /// upstream ends the accumulated reply is stored.
    pub async fn stream(
        &self,
        chat: PreparedChat,
        caller_id: Option<i64>,
    ) -> Result<BoxStream<'static, Result<Bytes, OllamaError>>, ChatbotError> {
        let mut upstream = self
            .ollama
            .chat_stream(&chat.messages, chat.options.as_ref())
            .await?;

        let (tx, rx) = mpsc::channel(32);
        let service = self.clone();
        let conversation_id = chat.conversation_id;

        tokio::spawn(async move {
            let mut accumulator = NdjsonAccumulator::default();
            let mut client_gone = false;

            while let Some(item) = upstream.next().await {
                match item {
                    Ok(chunk) => {
                        accumulator.push(&chunk);
                        if !client_gone && tx.send(Ok(chunk)).await.is_err() {
                            debug!("client disconnected, draining upstream");
                            client_gone = true;
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "upstream stream failed");
                        if !client_gone {
                            let _ = tx.send(Err(e)).await;
                        }
                        break;
                    }
                }
            }
            drop(tx);

            accumulator.finish();
            service
                .persist_reply(conversation_id, caller_id, accumulator.content())
                .await;
        });

        Ok(ReceiverStream::new(rx).boxed())
    }

    /// Store the assistant's reply. Failures are logged and never reach the caller.
    pub async fn persist_reply(
        &self,
        conversation_id: Option<i64>,
        caller_id: Option<i64>,
        content: &str,
    ) {
        let Some(conversation_id) = conversation_id else {
            return;
        };
        if content.trim().is_empty() {
            debug!(conversation_id, "empty reply, nothing to persist");
            return;
        }

        let conversation = match Conversation::find_by_id(&self.db.pool, conversation_id).await {
            Ok(Some(conversation)) => conversation,
            Ok(None) => {
                warn!(conversation_id, "reply not saved: conversation not found");
                return;
            }
            Err(e) => {
                warn!(conversation_id, error = %e, "reply not saved");
                return;
            }
        };

        if caller_id.is_some_and(|id| id != conversation.user_id) {
            warn!(conversation_id, ?caller_id, "reply not saved: conversation owned by another user");
            return;
        }

        if let Err(e) =
            ChatMessage::create(&self.db.pool, conversation_id, MessageRole::Ai, content).await
        {
            warn!(conversation_id, error = %e, "reply not saved");
            return;
        }
        if let Err(e) = Conversation::touch(&self.db.pool, conversation_id).await {
            warn!(conversation_id, error = %e, "failed to touch conversation");
        }
        info!(conversation_id, chars = content.chars().count(), "assistant reply saved");
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn question_is_last_user_turn() {
        let request: ChatbotRequest = serde_json::from_value(json!({
            "messages": [
                {"role": "system", "content": "Tu es un assistant."},
                {"role": "user", "content": "Première"},
                {"role": "assistant", "content": "Réponse"},
                {"role": "user", "content": "  Horaires de l'école ?  "}
            ]
        }))
        .unwrap();
        assert_eq!(request.question(), Some("Horaires de l'école ?"));
    }

    #[test]
    fn question_falls_back_to_query_param_and_rejects_blank() {
        let request = ChatbotRequest {
            question: Some("Bonjour".into()),
            ..Default::default()
        };
        assert_eq!(request.question(), Some("Bonjour"));

        let blank: ChatbotRequest = serde_json::from_value(json!({
            "messages": [{"role": "user", "content": "   "}]
        }))
        .unwrap();
        assert_eq!(blank.question(), None);
        assert_eq!(ChatbotRequest::default().question(), None);
    }

    #[test]
    fn instructions_merge_into_existing_system_turn() {
        let messages = vec![
            ChatTurn::system("Tu es Rafi9ni."),
            ChatTurn::new("user", "Bonjour"),
        ];
        let merged = inject_instructions(messages, rag_instructions("[a.txt]: info"));
        assert_eq!(merged.len(), 2);
        assert!(merged[0].content.starts_with("Tu es Rafi9ni.\n\n### INFORMATIONS IMPORTANTES"));
        assert!(merged[0].content.contains("[a.txt]: info\n\nRÈGLES POUR TA RÉPONSE"));
    }

    #[test]
    fn instructions_prepend_system_turn_when_absent() {
        let messages = vec![ChatTurn::new("user", "Bonjour")];
        let merged = inject_instructions(messages, "ctx".into());
        assert_eq!(merged[0], ChatTurn::system("ctx"));
        assert_eq!(merged[1].role, "user");
    }

    #[test]
    fn accumulator_handles_lines_split_across_chunks() {
        let mut acc = NdjsonAccumulator::default();
        acc.push(br#"{"message":{"role":"assistant","content":"Bon"},"done":false}"#);
        acc.push(b"\n{\"message\":{\"role\":\"assistant\",\"con");
        acc.push(b"tent\":\"jour\"},\"done\":false}\n\n");
        acc.push(br#"{"done":true}"#);
        assert_eq!(acc.content(), "Bonjour");
        acc.finish();
        assert_eq!(acc.content(), "Bonjour");
    }

    async fn service() -> (ChatbotService, DBService) {
        let db = DBService::new_in_memory().await.unwrap();
        let ollama = OllamaClient::new(&crate::services::config::OllamaConfig {
            base_url: "http://127.0.0.1:9".into(),
            chat_model: "llama3.2".into(),
            embed_model: "mxbai-embed-large".into(),
        })
        .unwrap();
        (ChatbotService::new(db.clone(), ollama, RagConfig::default()), db)
    }

    async fn owner(db: &DBService, email: &str) -> i64 {
        sqlx::query_scalar::<_, i64>(
            "INSERT INTO users (name, email, password_hash) VALUES ('P', $1, 'h') RETURNING id",
        )
        .bind(email)
        .fetch_one(&db.pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn persist_reply_stores_ai_turn_for_owner_only() {
        let (service, db) = service().await;
        let parent = owner(&db, "p@example.com").await;
        let stranger = owner(&db, "s@example.com").await;
        let conv = Conversation::create(&db.pool, parent, None).await.unwrap();

        service.persist_reply(Some(conv.id), Some(stranger), "Non").await;
        service.persist_reply(Some(conv.id), Some(parent), "   ").await;
        service.persist_reply(None, Some(parent), "Perdu").await;
        service.persist_reply(Some(999), None, "Perdu").await;
        service.persist_reply(Some(conv.id), None, "Bonjour !").await;

        let messages = ChatMessage::find_by_conversation_id(&db.pool, conv.id)
            .await
            .unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::Ai);
        assert_eq!(messages[0].content, "Bonjour !");
    }

    #[test]
    fn accumulator_skips_garbage_and_flushes_tail() {
        let mut acc = NdjsonAccumulator::default();
        acc.push(b"not json\n");
        acc.push("{\"message\":{\"content\":\"é\"}}".as_bytes());
        assert_eq!(acc.content(), "");
        acc.finish();
        assert_eq!(acc.content(), "é");
    }
}

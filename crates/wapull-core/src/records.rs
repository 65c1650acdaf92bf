//! Chat and message records derived from raw API items.
//!
//! Items are opaque JSON; field names differ between endpoint variants, so
//! every field is resolved from a short ordered list of candidate paths.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::sentiment::SentimentScorer;

const CHAT_ID_PATHS: &[&[&str]] = &[&["id"], &["chat_id"], &["_id"]];
const CONTACT_ID_PATHS: &[&[&str]] = &[&["contact_id"], &["contact", "id"]];
const BOT_ID_PATHS: &[&[&str]] = &[&["id"], &["bot_id"]];
const TEXT_PATHS: &[&[&str]] = &[&["text"], &["message", "text"], &["caption"]];
const DIRECTION_PATHS: &[&[&str]] = &[&["direction"], &["type"]];
const TIMESTAMP_PATHS: &[&[&str]] = &[&["timestamp"], &["created_at"], &["date"]];

/// A chat with a usable identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chat {
    pub id: String,
    pub contact_id: Option<String>,
    /// The item as returned by the API.
    pub raw: Value,
}

impl Chat {
    /// Returns `None` when the item carries no identifier.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let id = first_scalar(raw, CHAT_ID_PATHS)?;
        Some(Self {
            id,
            contact_id: first_scalar(raw, CONTACT_ID_PATHS),
            raw: raw.clone(),
        })
    }
}

/// One flattened, scored message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRow {
    pub chat_id: String,
    pub contact_id: Option<String>,
    pub direction: String,
    pub timestamp: Option<String>,
    pub text: String,
    pub sentiment: i32,
}

impl MessageRow {
    pub fn from_item(chat: &Chat, item: &Value, scorer: &dyn SentimentScorer) -> Self {
        let text = first_scalar(item, TEXT_PATHS).unwrap_or_default();
        let sentiment = scorer.score(&text);
        Self {
            chat_id: chat.id.clone(),
            contact_id: first_scalar(item, CONTACT_ID_PATHS).or_else(|| chat.contact_id.clone()),
            direction: first_scalar(item, DIRECTION_PATHS).unwrap_or_else(|| "unknown".to_string()),
            timestamp: first_scalar(item, TIMESTAMP_PATHS),
            text,
            sentiment,
        }
    }
}

/// Identifier of a bot list item.
pub fn bot_id(item: &Value) -> Option<String> {
    first_scalar(item, BOT_ID_PATHS)
}

/// Keep chats with an identifier, first occurrence of each id wins.
pub fn unique_chats(raw: &[Value]) -> Vec<Chat> {
    let mut seen = std::collections::HashSet::new();
    raw.iter()
        .filter_map(Chat::from_raw)
        .filter(|chat| seen.insert(chat.id.clone()))
        .collect()
}

fn first_scalar(item: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| {
        let mut node = item;
        for key in *path {
            node = node.get(key)?;
        }
        scalar(node)
    })
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::LexiconScorer;
    use serde_json::json;

    fn chat(raw: Value) -> Chat {
        Chat::from_raw(&raw).unwrap()
    }

    #[test]
    fn test_chat_id_fallbacks() {
        assert_eq!(chat(json!({"id": "c1"})).id, "c1");
        assert_eq!(chat(json!({"chat_id": 42})).id, "42");
        assert_eq!(chat(json!({"id": "", "_id": "x"})).id, "x");
        assert!(Chat::from_raw(&json!({"name": "no id"})).is_none());
        assert!(Chat::from_raw(&json!({"id": null})).is_none());
    }

    #[test]
    fn test_chat_contact_id() {
        assert_eq!(
            chat(json!({"id": "c1", "contact": {"id": "p9"}})).contact_id.as_deref(),
            Some("p9")
        );
        assert_eq!(chat(json!({"id": "c1"})).contact_id, None);
    }

    #[test]
    fn test_unique_chats_preserves_order() {
        let raw = vec![
            json!({"id": "b"}),
            json!({"title": "anonymous"}),
            json!({"id": "a"}),
            json!({"id": "b", "dup": true}),
        ];
        let ids: Vec<String> = unique_chats(&raw).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec!["b", "a"]);
    }

    #[test]
    fn test_message_text_resolution_order() {
        let scorer = LexiconScorer::spanish();
        let c = chat(json!({"id": "c1"}));

        let row = MessageRow::from_item(&c, &json!({"text": "", "message": {"text": "hola"}}), &scorer);
        assert_eq!(row.text, "hola");

        let row = MessageRow::from_item(&c, &json!({"caption": "foto"}), &scorer);
        assert_eq!(row.text, "foto");

        let row = MessageRow::from_item(&c, &json!({"message": {"type": "image"}}), &scorer);
        assert_eq!(row.text, "");
        assert_eq!(row.sentiment, 0);
    }

    #[test]
    fn test_direction_fallbacks() {
        let scorer = LexiconScorer::spanish();
        let c = chat(json!({"id": "c1"}));

        let row = MessageRow::from_item(&c, &json!({"direction": "out", "type": "text"}), &scorer);
        assert_eq!(row.direction, "out");
        let row = MessageRow::from_item(&c, &json!({"type": "incoming"}), &scorer);
        assert_eq!(row.direction, "incoming");
        let row = MessageRow::from_item(&c, &json!({}), &scorer);
        assert_eq!(row.direction, "unknown");
    }

    #[test]
    fn test_contact_falls_back_to_chat() {
        let scorer = LexiconScorer::spanish();
        let c = chat(json!({"id": "c1", "contact_id": "p1"}));

        let row = MessageRow::from_item(&c, &json!({"text": "hola"}), &scorer);
        assert_eq!(row.contact_id.as_deref(), Some("p1"));
        let row = MessageRow::from_item(&c, &json!({"contact_id": "p2"}), &scorer);
        assert_eq!(row.contact_id.as_deref(), Some("p2"));
    }

    #[test]
    fn test_row_serializes_flat() {
        let scorer = LexiconScorer::spanish();
        let c = chat(json!({"id": "c1"}));
        let row = MessageRow::from_item(
            &c,
            &json!({"text": "gracias", "timestamp": "t1", "direction": "in"}),
            &scorer,
        );
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!({
                "chatId": "c1",
                "contactId": null,
                "direction": "in",
                "timestamp": "t1",
                "text": "gracias",
                "sentiment": 1
            })
        );
    }

    #[test]
    fn test_timestamp_kept_verbatim() {
        let scorer = LexiconScorer::spanish();
        let c = chat(json!({"id": "c1"}));
        let row = MessageRow::from_item(&c, &json!({"created_at": 1717171717}), &scorer);
        assert_eq!(row.timestamp.as_deref(), Some("1717171717"));
        let row = MessageRow::from_item(&c, &json!({"date": "ayer"}), &scorer);
        assert_eq!(row.timestamp.as_deref(), Some("ayer"));
    }

    #[test]
    fn test_bot_id() {
        assert_eq!(bot_id(&json!({"id": "b-1", "name": "Soporte"})).as_deref(), Some("b-1"));
        assert_eq!(bot_id(&json!({"bot_id": 7})).as_deref(), Some("7"));
        assert_eq!(bot_id(&json!({"name": "x"})), None);
    }
}

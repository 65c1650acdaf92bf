//! Candidate endpoint catalog.
//!
//! Each capability has a ranked list of path shapes observed across SendPulse
//! accounts. The order is significant: the most common shape comes first and
//! discovery stops at the first one the account answers.

use std::fmt;

use serde::Serialize;

use crate::error::FetchError;

use QueryParam::{ChatId as ChatIdParam, Fixed};
use Segment::{BotId, ChatId, Lit};

/// A logical API operation served by one of several physical endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Capability {
    Chats,
    Messages,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Chats => "chats",
            Capability::Messages => "messages",
        }
    }

    /// Ranked candidates for this capability.
    pub fn candidates(&self) -> &'static [EndpointCandidate] {
        match self {
            Capability::Chats => CHAT_CANDIDATES,
            Capability::Messages => MESSAGE_CANDIDATES,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One path segment of a candidate template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    Lit(&'static str),
    BotId,
    ChatId,
}

/// One query parameter of a candidate template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryParam {
    Fixed(&'static str, &'static str),
    BotId(&'static str),
    ChatId(&'static str),
}

/// Identifiers available for filling template placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextIds {
    pub bot_id: Option<String>,
    pub chat_id: Option<String>,
}

impl ContextIds {
    pub fn new(bot_id: Option<String>, chat_id: Option<String>) -> Self {
        Self { bot_id, chat_id }
    }

    fn bot_id(&self) -> Option<&str> {
        self.bot_id.as_deref().filter(|id| !id.is_empty())
    }

    fn chat_id(&self) -> Option<&str> {
        self.chat_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// Optional date window, passed through verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateRange {
    pub since: Option<String>,
    pub until: Option<String>,
}

impl DateRange {
    pub fn params(&self) -> Vec<(String, String)> {
        let mut params = Vec::new();
        if let Some(since) = &self.since {
            params.push(("date_from".to_string(), since.clone()));
        }
        if let Some(until) = &self.until {
            params.push(("date_to".to_string(), until.clone()));
        }
        params
    }
}

/// A hypothesized endpoint shape for a capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointCandidate {
    pub path: &'static [Segment],
    pub query: &'static [QueryParam],
    pub supports_date_range: bool,
}

impl EndpointCandidate {
    pub fn requires_bot_id(&self) -> bool {
        self.path.contains(&Segment::BotId)
            || self.query.iter().any(|q| matches!(q, QueryParam::BotId(_)))
    }

    pub fn requires_chat_id(&self) -> bool {
        self.path.contains(&Segment::ChatId)
            || self.query.iter().any(|q| matches!(q, QueryParam::ChatId(_)))
    }

    /// Human-readable template, e.g. `/whatsapp/bots/{bot_id}/chats`.
    pub fn pattern(&self) -> String {
        let mut out = String::new();
        for segment in self.path {
            out.push('/');
            match segment {
                Segment::Lit(s) => out.push_str(s),
                Segment::BotId => out.push_str("{bot_id}"),
                Segment::ChatId => out.push_str("{chat_id}"),
            }
        }
        for (i, param) in self.query.iter().enumerate() {
            out.push(if i == 0 { '?' } else { '&' });
            match param {
                QueryParam::Fixed(k, v) => out.push_str(&format!("{}={}", k, v)),
                QueryParam::BotId(k) => out.push_str(&format!("{}={{bot_id}}", k)),
                QueryParam::ChatId(k) => out.push_str(&format!("{}={{chat_id}}", k)),
            }
        }
        out
    }

    /// Date parameters this candidate accepts.
    pub fn date_params(&self, range: &DateRange) -> Vec<(String, String)> {
        if self.supports_date_range {
            range.params()
        } else {
            Vec::new()
        }
    }

    /// Fill placeholders from `ids`. Fails if a required id is missing.
    pub fn render(&self, ids: &ContextIds) -> Result<RenderedRequest, FetchError> {
        let missing = |placeholder| FetchError::Unresolved {
            pattern: self.pattern(),
            placeholder,
        };

        let mut segments = Vec::with_capacity(self.path.len());
        for segment in self.path {
            let value = match segment {
                Segment::Lit(s) => *s,
                Segment::BotId => ids.bot_id().ok_or_else(|| missing("bot_id"))?,
                Segment::ChatId => ids.chat_id().ok_or_else(|| missing("chat_id"))?,
            };
            segments.push(value.to_string());
        }

        let mut query = Vec::with_capacity(self.query.len());
        for param in self.query {
            let (key, value) = match param {
                QueryParam::Fixed(k, v) => (*k, *v),
                QueryParam::BotId(k) => (*k, ids.bot_id().ok_or_else(|| missing("bot_id"))?),
                QueryParam::ChatId(k) => (*k, ids.chat_id().ok_or_else(|| missing("chat_id"))?),
            };
            query.push((key.to_string(), value.to_string()));
        }

        Ok(RenderedRequest { segments, query })
    }
}

/// A concrete request: path segments (unescaped) plus query pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedRequest {
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
}

impl RenderedRequest {
    pub fn new(segments: &[&str]) -> Self {
        Self {
            segments: segments.iter().map(|s| s.to_string()).collect(),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, params: impl IntoIterator<Item = (String, String)>) -> Self {
        self.query.extend(params);
        self
    }

    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    /// Encoded query with a leading `?`, or empty when there are no params.
    pub fn query_string(&self) -> String {
        if self.query.is_empty() {
            return String::new();
        }
        let encoded = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(&self.query)
            .finish();
        format!("?{}", encoded)
    }
}

/// The candidate accepted for a capability, fixed for the rest of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEndpoint {
    pub capability: Capability,
    pub candidate: EndpointCandidate,
    /// Zero-based position in the capability's candidate list.
    pub rank: usize,
    /// URL of the probe request that was accepted.
    pub probe_url: String,
}

impl ResolvedEndpoint {
    pub fn pattern(&self) -> String {
        self.candidate.pattern()
    }
}

pub const CHAT_CANDIDATES: &[EndpointCandidate] = &[
    // bot-scoped WhatsApp
    EndpointCandidate {
        path: &[Lit("whatsapp"), Lit("bots"), BotId, Lit("chats")],
        query: &[],
        supports_date_range: true,
    },
    // global WhatsApp
    EndpointCandidate {
        path: &[Lit("whatsapp"), Lit("chats")],
        query: &[],
        supports_date_range: true,
    },
    // generic chatbot, needs the channel filter
    EndpointCandidate {
        path: &[Lit("chatbots"), Lit("chats")],
        query: &[Fixed("channel", "whatsapp")],
        supports_date_range: true,
    },
    EndpointCandidate {
        path: &[Lit("livechat"), Lit("chats")],
        query: &[],
        supports_date_range: false,
    },
    EndpointCandidate {
        path: &[Lit("chatbots"), Lit("bots"), BotId, Lit("chats")],
        query: &[],
        supports_date_range: true,
    },
    EndpointCandidate {
        path: &[Lit("conversations")],
        query: &[],
        supports_date_range: false,
    },
];

pub const MESSAGE_CANDIDATES: &[EndpointCandidate] = &[
    EndpointCandidate {
        path: &[
            Lit("whatsapp"),
            Lit("bots"),
            BotId,
            Lit("chats"),
            ChatId,
            Lit("messages"),
        ],
        query: &[],
        supports_date_range: true,
    },
    EndpointCandidate {
        path: &[Lit("whatsapp"), Lit("chats"), ChatId, Lit("messages")],
        query: &[],
        supports_date_range: true,
    },
    EndpointCandidate {
        path: &[Lit("chatbots"), Lit("messages")],
        query: &[ChatIdParam("chat_id")],
        supports_date_range: true,
    },
    EndpointCandidate {
        path: &[Lit("chatbots"), Lit("chats"), ChatId, Lit("messages")],
        query: &[],
        supports_date_range: true,
    },
    EndpointCandidate {
        path: &[Lit("livechat"), Lit("chats"), ChatId, Lit("messages")],
        query: &[],
        supports_date_range: false,
    },
    EndpointCandidate {
        path: &[Lit("conversations"), ChatId, Lit("messages")],
        query: &[],
        supports_date_range: false,
    },
];

/// Path used to list the account's WhatsApp bots.
pub fn bots_request() -> RenderedRequest {
    RenderedRequest::new(&["whatsapp", "bots"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_candidate_order() {
        let patterns: Vec<String> = CHAT_CANDIDATES.iter().map(|c| c.pattern()).collect();
        assert_eq!(
            patterns,
            vec![
                "/whatsapp/bots/{bot_id}/chats",
                "/whatsapp/chats",
                "/chatbots/chats?channel=whatsapp",
                "/livechat/chats",
                "/chatbots/bots/{bot_id}/chats",
                "/conversations",
            ]
        );
    }

    #[test]
    fn test_message_candidate_order() {
        let patterns: Vec<String> = MESSAGE_CANDIDATES.iter().map(|c| c.pattern()).collect();
        assert_eq!(
            patterns,
            vec![
                "/whatsapp/bots/{bot_id}/chats/{chat_id}/messages",
                "/whatsapp/chats/{chat_id}/messages",
                "/chatbots/messages?chat_id={chat_id}",
                "/chatbots/chats/{chat_id}/messages",
                "/livechat/chats/{chat_id}/messages",
                "/conversations/{chat_id}/messages",
            ]
        );
        assert!(MESSAGE_CANDIDATES.iter().all(|c| c.requires_chat_id()));
    }

    #[test]
    fn test_render_fills_placeholders() {
        let ids = ContextIds::new(Some("b1".to_string()), Some("c 9".to_string()));
        let rendered = MESSAGE_CANDIDATES[0].render(&ids).unwrap();
        assert_eq!(
            rendered.segments,
            vec!["whatsapp", "bots", "b1", "chats", "c 9", "messages"]
        );

        let rendered = MESSAGE_CANDIDATES[2].render(&ids).unwrap();
        assert_eq!(rendered.path(), "/chatbots/messages");
        assert_eq!(
            rendered.query,
            vec![("chat_id".to_string(), "c 9".to_string())]
        );
    }

    #[test]
    fn test_render_reports_missing_bot_id() {
        let err = CHAT_CANDIDATES[0]
            .render(&ContextIds::default())
            .unwrap_err();
        assert!(matches!(
            err,
            FetchError::Unresolved { placeholder: "bot_id", .. }
        ));
        assert!(CHAT_CANDIDATES[1].render(&ContextIds::default()).is_ok());
    }

    #[test]
    fn test_empty_ids_count_as_missing() {
        let ids = ContextIds::new(Some(String::new()), None);
        assert!(CHAT_CANDIDATES[0].render(&ids).is_err());
    }

    #[test]
    fn test_date_params_only_when_supported() {
        let range = DateRange {
            since: Some("2024-01-01".to_string()),
            until: None,
        };
        assert_eq!(
            CHAT_CANDIDATES[0].date_params(&range),
            vec![("date_from".to_string(), "2024-01-01".to_string())]
        );
        assert!(CHAT_CANDIDATES[3].date_params(&range).is_empty());
    }
}

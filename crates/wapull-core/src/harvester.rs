//! Run orchestration.
//!
//! `Authenticating → ResolvingBot → DiscoveringChatsEndpoint → FetchingChats →
//! DiscoveringMessagesEndpoint → FetchingMessages → Done`, with `NoData` as an
//! early terminal state when no chat exposes an identifier.
//!
//! Every step before `FetchingMessages` is fatal on failure. During
//! `FetchingMessages` a failing chat is recorded and skipped.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::client::{build_http_client, ApiClient, PageFetcher};
use crate::config::HarvestConfig;
use crate::discovery::probe;
use crate::endpoints::{bots_request, Capability, ContextIds, ResolvedEndpoint};
use crate::error::{FetchError, HarvestError};
use crate::paginate::{paginate, PageLimits};
use crate::records::{self, unique_chats, Chat, MessageRow};
use crate::sentiment::{LexiconScorer, SentimentScorer};
use wapull_auth_bridge::AuthBridge;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HarvestStage {
    Authenticating,
    ResolvingBot,
    DiscoveringChatsEndpoint,
    FetchingChats,
    DiscoveringMessagesEndpoint,
    FetchingMessages,
    Done,
    NoData,
}

impl HarvestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            HarvestStage::Authenticating => "authenticating",
            HarvestStage::ResolvingBot => "resolving bot",
            HarvestStage::DiscoveringChatsEndpoint => "discovering chats endpoint",
            HarvestStage::FetchingChats => "fetching chats",
            HarvestStage::DiscoveringMessagesEndpoint => "discovering messages endpoint",
            HarvestStage::FetchingMessages => "fetching messages",
            HarvestStage::Done => "done",
            HarvestStage::NoData => "no data",
        }
    }
}

impl fmt::Display for HarvestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Hooks invoked as a harvest progresses.
///
/// The persistence hooks return `io::Result`; an error aborts the run.
pub trait HarvestObserver: Send + Sync {
    fn stage_changed(&self, _stage: HarvestStage) {}

    /// Called once per capability, right after discovery.
    fn endpoint_resolved(&self, _endpoint: &ResolvedEndpoint) -> std::io::Result<()> {
        Ok(())
    }

    /// Called with the raw chat list before any message is fetched.
    fn chats_fetched(&self, _raw_chats: &[Value]) -> std::io::Result<()> {
        Ok(())
    }

    fn messages_started(&self, _total_chats: usize) {}

    fn chat_finished(&self, _chat: &Chat, _rows: usize) {}

    fn chat_skipped(&self, _chat: &Chat, _error: &FetchError) {}
}

pub struct NoopObserver;

impl HarvestObserver for NoopObserver {}

/// A chat whose messages could not be fetched.
#[derive(Debug, Clone)]
pub struct SkippedChat {
    pub chat_id: String,
    pub error: FetchError,
}

#[derive(Debug, Clone)]
pub struct HarvestOutcome {
    pub bot_id: Option<String>,
    pub chats_endpoint: ResolvedEndpoint,
    /// `None` when the run ended in [`HarvestStage::NoData`].
    pub messages_endpoint: Option<ResolvedEndpoint>,
    pub raw_chats: Vec<Value>,
    pub chats: Vec<Chat>,
    /// Rows grouped by chat, in chat order.
    pub messages: Vec<MessageRow>,
    pub skipped: Vec<SkippedChat>,
    pub final_stage: HarvestStage,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl HarvestOutcome {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Result of a discovery-only run.
#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub bot_id: Option<String>,
    pub chats_endpoint: ResolvedEndpoint,
    pub sample_chat_id: Option<String>,
    pub messages_endpoint: Option<ResolvedEndpoint>,
}

struct Session {
    client: ApiClient,
    bot_id: Option<String>,
}

pub struct Harvester<'a> {
    config: &'a HarvestConfig,
    scorer: Arc<dyn SentimentScorer>,
    observer: &'a dyn HarvestObserver,
}

impl<'a> Harvester<'a> {
    pub fn new(config: &'a HarvestConfig) -> Self {
        Self {
            config,
            scorer: Arc::new(LexiconScorer::spanish()),
            observer: &NoopObserver,
        }
    }

    pub fn with_scorer(mut self, scorer: Arc<dyn SentimentScorer>) -> Self {
        self.scorer = scorer;
        self
    }

    pub fn with_observer(mut self, observer: &'a dyn HarvestObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Run the whole pipeline.
    pub async fn run(&self) -> Result<HarvestOutcome, HarvestError> {
        let started_at = Utc::now();

        let session = self.open_session().await?;
        let chats_endpoint = self.discover_chats(&session).await?;
        let raw_chats = self
            .fetch_chats(&session, &chats_endpoint, self.config.limits)
            .await?;
        self.observer.chats_fetched(&raw_chats)?;

        let chats = unique_chats(&raw_chats);
        info!(
            "fetched {} chats ({} with a usable identifier)",
            raw_chats.len(),
            chats.len()
        );

        let Some(sample) = chats.first() else {
            warn!("no chat exposes an identifier, skipping message discovery");
            self.enter(HarvestStage::NoData);
            return Ok(HarvestOutcome {
                bot_id: session.bot_id,
                chats_endpoint,
                messages_endpoint: None,
                raw_chats,
                chats,
                messages: Vec::new(),
                skipped: Vec::new(),
                final_stage: HarvestStage::NoData,
                started_at,
                finished_at: Utc::now(),
            });
        };

        let messages_endpoint = self.discover_messages(&session, sample).await?;
        let (messages, skipped) = self
            .fetch_all_messages(&session, &messages_endpoint, &chats)
            .await;

        self.enter(HarvestStage::Done);
        info!(
            "harvest complete: {} messages from {} chats, {} skipped",
            messages.len(),
            chats.len() - skipped.len(),
            skipped.len()
        );

        Ok(HarvestOutcome {
            bot_id: session.bot_id,
            chats_endpoint,
            messages_endpoint: Some(messages_endpoint),
            raw_chats,
            chats,
            messages,
            skipped,
            final_stage: HarvestStage::Done,
            started_at,
            finished_at: Utc::now(),
        })
    }

    /// Resolve both endpoints without draining any data.
    ///
    /// Only the first page of chats is read, to find a sample chat id.
    pub async fn discover(&self) -> Result<DiscoveryReport, HarvestError> {
        let session = self.open_session().await?;
        let chats_endpoint = self.discover_chats(&session).await?;

        let first_page = PageLimits {
            page_size: self.config.limits.page_size,
            max_items: self.config.limits.page_size,
        };
        let raw_chats = self
            .fetch_chats(&session, &chats_endpoint, first_page)
            .await?;
        let sample = unique_chats(&raw_chats).into_iter().next();

        let messages_endpoint = match &sample {
            Some(chat) => Some(self.discover_messages(&session, chat).await?),
            None => {
                self.enter(HarvestStage::NoData);
                None
            }
        };

        Ok(DiscoveryReport {
            bot_id: session.bot_id,
            chats_endpoint,
            sample_chat_id: sample.map(|c| c.id),
            messages_endpoint,
        })
    }

    fn enter(&self, stage: HarvestStage) {
        debug!("harvest stage: {}", stage);
        self.observer.stage_changed(stage);
    }

    async fn open_session(&self) -> Result<Session, HarvestError> {
        self.enter(HarvestStage::Authenticating);
        let http_client = build_http_client(self.config.timeout)?;
        let auth = AuthBridge::new(http_client.clone(), self.config.token_url());
        let credential = auth.acquire_credential(&self.config.credentials).await?;
        let client =
            ApiClient::new(http_client, self.config.api_base.clone()).with_credential(credential);

        self.enter(HarvestStage::ResolvingBot);
        let bot_id = match &self.config.bot_id {
            Some(id) => {
                info!("using configured bot {}", id);
                Some(id.clone())
            }
            None => detect_bot(&client).await,
        };

        Ok(Session { client, bot_id })
    }

    async fn discover_chats(&self, session: &Session) -> Result<ResolvedEndpoint, HarvestError> {
        self.enter(HarvestStage::DiscoveringChatsEndpoint);
        let ids = ContextIds::new(session.bot_id.clone(), None);
        let endpoint = probe(
            &session.client,
            Capability::Chats,
            Capability::Chats.candidates(),
            &ids,
            &self.config.dates,
        )
        .await?;
        self.observer.endpoint_resolved(&endpoint)?;
        Ok(endpoint)
    }

    async fn fetch_chats(
        &self,
        session: &Session,
        endpoint: &ResolvedEndpoint,
        limits: PageLimits,
    ) -> Result<Vec<Value>, HarvestError> {
        self.enter(HarvestStage::FetchingChats);
        let ids = ContextIds::new(session.bot_id.clone(), None);
        let params = endpoint.candidate.date_params(&self.config.dates);
        Ok(paginate(&session.client, endpoint, &ids, &params, limits).await?)
    }

    async fn discover_messages(
        &self,
        session: &Session,
        sample: &Chat,
    ) -> Result<ResolvedEndpoint, HarvestError> {
        self.enter(HarvestStage::DiscoveringMessagesEndpoint);
        debug!("probing message endpoints with sample chat {}", sample.id);
        let ids = ContextIds::new(session.bot_id.clone(), Some(sample.id.clone()));
        let endpoint = probe(
            &session.client,
            Capability::Messages,
            Capability::Messages.candidates(),
            &ids,
            &self.config.dates,
        )
        .await?;
        self.observer.endpoint_resolved(&endpoint)?;
        Ok(endpoint)
    }

    /// Fetch every chat's messages, at most `concurrency` chats at a time.
    ///
    /// Results are consumed in chat order regardless of completion order, so
    /// rows stay grouped and ordered by chat.
    async fn fetch_all_messages(
        &self,
        session: &Session,
        endpoint: &ResolvedEndpoint,
        chats: &[Chat],
    ) -> (Vec<MessageRow>, Vec<SkippedChat>) {
        self.enter(HarvestStage::FetchingMessages);
        self.observer.messages_started(chats.len());

        let params = endpoint.candidate.date_params(&self.config.dates);
        let params = params.as_slice();
        let results = stream::iter(chats)
            .map(|chat| async move {
                let result = self.fetch_chat_messages(session, endpoint, chat, params).await;
                (chat, result)
            })
            .buffered(self.config.concurrency);
        let mut results = std::pin::pin!(results);

        let mut rows = Vec::new();
        let mut skipped = Vec::new();
        while let Some((chat, result)) = results.next().await {
            match result {
                Ok(mut chat_rows) => {
                    self.observer.chat_finished(chat, chat_rows.len());
                    rows.append(&mut chat_rows);
                }
                Err(err) => {
                    if self.config.verbose {
                        warn!("skipping chat {}: {}", chat.id, err);
                    } else {
                        debug!("skipping chat {}: {}", chat.id, err);
                    }
                    self.observer.chat_skipped(chat, &err);
                    skipped.push(SkippedChat {
                        chat_id: chat.id.clone(),
                        error: err,
                    });
                }
            }
        }

        (rows, skipped)
    }

    async fn fetch_chat_messages(
        &self,
        session: &Session,
        endpoint: &ResolvedEndpoint,
        chat: &Chat,
        params: &[(String, String)],
    ) -> Result<Vec<MessageRow>, FetchError> {
        let ids = ContextIds::new(session.bot_id.clone(), Some(chat.id.clone()));
        let items = paginate(&session.client, endpoint, &ids, params, self.config.limits).await?;
        Ok(items
            .iter()
            .map(|item| MessageRow::from_item(chat, item, self.scorer.as_ref()))
            .collect())
    }
}

/// Pick the first bot on the account. A failed or empty listing is not fatal;
/// bot-scoped candidates will simply be skipped during discovery.
async fn detect_bot(client: &ApiClient) -> Option<String> {
    match client.fetch_items(&bots_request()).await {
        Ok(bots) => {
            let bot_id = bots.first().and_then(records::bot_id);
            match &bot_id {
                Some(id) if bots.len() > 1 => {
                    info!("{} bots on the account, using the first ({})", bots.len(), id)
                }
                Some(id) => info!("using bot {}", id),
                None => warn!("bot list is empty or has no identifier, continuing without a bot"),
            }
            bot_id
        }
        Err(err) => {
            warn!("could not list bots, continuing without a bot: {}", err);
            None
        }
    }
}

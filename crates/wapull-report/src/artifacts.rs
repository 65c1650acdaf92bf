//! Files written into the output directory.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use wapull_core::{HarvestObserver, MessageRow, ResolvedEndpoint};

use crate::charts::{histogram_svg, top_chats_svg};
use crate::error::ArtifactError;
use crate::summary::{sentiment_histogram, summarize, ChatSummary};

pub const RAW_CHATS_FILE: &str = "chats.raw.json";
pub const MESSAGES_FILE: &str = "messages.raw.json";
pub const SUMMARY_FILE: &str = "summary_by_chat.csv";
pub const HISTOGRAM_FILE: &str = "hist_sentimiento.svg";
pub const TOP_CHATS_FILE: &str = "avg_sentimiento_top_chats.svg";

/// Writes harvest artifacts into one output directory.
///
/// Also a [`HarvestObserver`], so the raw chat list reaches disk before
/// message fetching starts.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    out_dir: PathBuf,
    verbose: bool,
}

impl ArtifactWriter {
    /// `verbose` enables the `<capability>_endpoint.txt` debug files.
    pub fn new(out_dir: impl Into<PathBuf>, verbose: bool) -> Self {
        Self {
            out_dir: out_dir.into(),
            verbose,
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    pub fn path(&self, file_name: &str) -> PathBuf {
        self.out_dir.join(file_name)
    }

    /// Create the output directory if needed.
    pub fn prepare(&self) -> Result<(), ArtifactError> {
        fs::create_dir_all(&self.out_dir).map_err(|source| ArtifactError::Write {
            path: self.out_dir.clone(),
            source,
        })
    }

    pub fn write_raw_chats(&self, raw_chats: &[Value]) -> Result<PathBuf, ArtifactError> {
        self.write_json(RAW_CHATS_FILE, &raw_chats)
    }

    pub fn write_messages(&self, rows: &[MessageRow]) -> Result<PathBuf, ArtifactError> {
        self.write_json(MESSAGES_FILE, &rows)
    }

    pub fn write_summary_csv(&self, summaries: &[ChatSummary]) -> Result<PathBuf, ArtifactError> {
        let path = self.path(SUMMARY_FILE);
        let csv_error = |source| ArtifactError::Csv {
            path: path.clone(),
            source,
        };

        let mut writer = csv::Writer::from_path(&path).map_err(csv_error)?;
        if summaries.is_empty() {
            writer
                .write_record(["chatId", "msgs", "avg_sentiment"])
                .map_err(csv_error)?;
        }
        for summary in summaries {
            writer.serialize(summary).map_err(csv_error)?;
        }
        writer.flush().map_err(|source| ArtifactError::Write {
            path: path.clone(),
            source,
        })?;

        debug!("wrote {} summary rows to {}", summaries.len(), path.display());
        Ok(path)
    }

    /// Write the summary CSV and both charts derived from `rows`.
    pub fn write_report(&self, rows: &[MessageRow]) -> Result<Vec<PathBuf>, ArtifactError> {
        let summaries = summarize(rows);
        let histogram = sentiment_histogram(rows);
        Ok(vec![
            self.write_summary_csv(&summaries)?,
            self.write_text(HISTOGRAM_FILE, &histogram_svg(&histogram))?,
            self.write_text(TOP_CHATS_FILE, &top_chats_svg(&summaries))?,
        ])
    }

    /// `<capability>_endpoint.txt`: pattern on the first line, probe URL on the second.
    pub fn write_endpoint(&self, endpoint: &ResolvedEndpoint) -> Result<PathBuf, ArtifactError> {
        let file_name = format!("{}_endpoint.txt", endpoint.capability);
        let contents = format!("{}\n{}\n", endpoint.pattern(), endpoint.probe_url);
        self.write_text(&file_name, &contents)
    }

    fn write_json<T: Serialize + ?Sized>(
        &self,
        file_name: &str,
        value: &T,
    ) -> Result<PathBuf, ArtifactError> {
        let path = self.path(file_name);
        let json = serde_json::to_string_pretty(value).map_err(|source| ArtifactError::Json {
            path: path.clone(),
            source,
        })?;
        self.write_text(file_name, &json)
    }

    fn write_text(&self, file_name: &str, contents: &str) -> Result<PathBuf, ArtifactError> {
        let path = self.path(file_name);
        fs::write(&path, contents).map_err(|source| ArtifactError::Write {
            path: path.clone(),
            source,
        })?;
        debug!("wrote {}", path.display());
        Ok(path)
    }
}

impl HarvestObserver for ArtifactWriter {
    fn endpoint_resolved(&self, endpoint: &ResolvedEndpoint) -> std::io::Result<()> {
        if self.verbose {
            self.write_endpoint(endpoint)?;
        }
        Ok(())
    }

    fn chats_fetched(&self, raw_chats: &[Value]) -> std::io::Result<()> {
        let path = self.write_raw_chats(raw_chats)?;
        info!("saved {} raw chats to {}", raw_chats.len(), path.display());
        Ok(())
    }
}

/// Load rows from a previously written `messages.raw.json`.
pub fn read_messages(path: &Path) -> Result<Vec<MessageRow>, ArtifactError> {
    let contents = fs::read_to_string(path).map_err(|source| ArtifactError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ArtifactError::Json {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wapull_core::endpoints::CHAT_CANDIDATES;
    use wapull_core::Capability;

    fn row(chat_id: &str, text: &str, sentiment: i32) -> MessageRow {
        MessageRow {
            chat_id: chat_id.to_string(),
            contact_id: Some("p1".to_string()),
            direction: "in".to_string(),
            timestamp: Some("2024-05-01T10:00:00Z".to_string()),
            text: text.to_string(),
            sentiment,
        }
    }

    fn writer(verbose: bool) -> (TempDir, ArtifactWriter) {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path().join("out"), verbose);
        writer.prepare().unwrap();
        (dir, writer)
    }

    #[test]
    fn test_messages_round_trip_through_disk() {
        let (_dir, writer) = writer(false);
        let rows = vec![row("c1", "gracias", 1), row("c2", "malo", -1)];

        let path = writer.write_messages(&rows).unwrap();
        assert!(path.ends_with(MESSAGES_FILE));
        assert_eq!(read_messages(&path).unwrap(), rows);

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["chatId"], "c1");
        assert_eq!(raw[1]["sentiment"], -1);
    }

    #[test]
    fn test_summary_csv_layout() {
        let (_dir, writer) = writer(false);
        let rows = vec![row("c1", "", 1), row("c2", "", -1), row("c1", "", 0)];

        let paths = writer.write_report(&rows).unwrap();
        assert_eq!(paths.len(), 3);

        let contents = fs::read_to_string(writer.path(SUMMARY_FILE)).unwrap();
        assert_eq!(contents.lines().next(), Some("chatId,msgs,avg_sentiment"));

        let mut reader = csv::Reader::from_path(writer.path(SUMMARY_FILE)).unwrap();
        let parsed: Vec<ChatSummary> = reader.deserialize().map(|r| r.unwrap()).collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].chat_id, "c1");
        assert_eq!(parsed[0].msgs, 2);
        assert!((parsed[0].avg_sentiment - 0.5).abs() < 1e-9);
        assert_eq!(parsed[1].chat_id, "c2");

        assert!(writer.path(HISTOGRAM_FILE).exists());
        assert!(writer.path(TOP_CHATS_FILE).exists());
    }

    #[test]
    fn test_empty_summary_still_has_header() {
        let (_dir, writer) = writer(false);
        writer.write_report(&[]).unwrap();
        let contents = fs::read_to_string(writer.path(SUMMARY_FILE)).unwrap();
        assert_eq!(contents.trim_end(), "chatId,msgs,avg_sentiment");
    }

    #[test]
    fn test_observer_persists_raw_chats() {
        let (_dir, writer) = writer(false);
        let raw = vec![json!({"id": "c1", "extra": {"nested": true}}), json!({"name": "x"})];

        writer.chats_fetched(&raw).unwrap();

        let saved: Vec<Value> =
            serde_json::from_str(&fs::read_to_string(writer.path(RAW_CHATS_FILE)).unwrap())
                .unwrap();
        assert_eq!(saved, raw);
    }

    fn resolved() -> ResolvedEndpoint {
        ResolvedEndpoint {
            capability: Capability::Chats,
            candidate: CHAT_CANDIDATES[1],
            rank: 1,
            probe_url: "https://api.test/whatsapp/chats?limit=1&offset=0".to_string(),
        }
    }

    #[test]
    fn test_endpoint_files_only_when_verbose() {
        let (_dir, quiet) = writer(false);
        quiet.endpoint_resolved(&resolved()).unwrap();
        assert!(!quiet.path("chats_endpoint.txt").exists());

        let (_dir, verbose) = writer(true);
        verbose.endpoint_resolved(&resolved()).unwrap();
        let contents = fs::read_to_string(verbose.path("chats_endpoint.txt")).unwrap();
        assert_eq!(
            contents,
            "/whatsapp/chats\nhttps://api.test/whatsapp/chats?limit=1&offset=0\n"
        );
    }

    #[test]
    fn test_missing_directory_is_reported() {
        let dir = TempDir::new().unwrap();
        let writer = ArtifactWriter::new(dir.path().join("missing"), false);
        let err = writer.write_messages(&[]).unwrap_err();
        assert!(matches!(err, ArtifactError::Write { .. }));
    }

    #[test]
    fn test_read_messages_rejects_garbage() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(MESSAGES_FILE);
        fs::write(&path, "not json").unwrap();
        assert!(matches!(
            read_messages(&path).unwrap_err(),
            ArtifactError::Json { .. }
        ));
    }
}

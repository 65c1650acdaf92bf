use std::path::PathBuf;

use anyhow::Result;
use indicatif::ProgressBar;
use serde_json::Value;
use wapull_core::{
    Chat, FetchError, HarvestConfig, HarvestObserver, HarvestOutcome, HarvestStage, Harvester,
    ResolvedEndpoint,
};
use wapull_report::artifacts::RAW_CHATS_FILE;
use wapull_report::ArtifactWriter;

use crate::ui;

/// Persists artifacts as they become available and drives the terminal progress.
struct HarvestProgress {
    artifacts: ArtifactWriter,
    pb: ProgressBar,
}

impl HarvestObserver for HarvestProgress {
    fn stage_changed(&self, stage: HarvestStage) {
        if stage != HarvestStage::FetchingMessages {
            self.pb.set_message(capitalize(stage.as_str()));
        }
    }

    fn endpoint_resolved(&self, endpoint: &ResolvedEndpoint) -> std::io::Result<()> {
        self.artifacts.endpoint_resolved(endpoint)
    }

    fn chats_fetched(&self, raw_chats: &[Value]) -> std::io::Result<()> {
        self.artifacts.chats_fetched(raw_chats)
    }

    fn messages_started(&self, total_chats: usize) {
        ui::apply_bar_style(&self.pb);
        self.pb.set_length(total_chats as u64);
        self.pb.set_position(0);
        self.pb.set_message("Fetching messages".to_string());
    }

    fn chat_finished(&self, _chat: &Chat, _rows: usize) {
        self.pb.inc(1);
    }

    fn chat_skipped(&self, _chat: &Chat, _error: &FetchError) {
        self.pb.inc(1);
    }
}

pub async fn run(config: HarvestConfig) -> Result<()> {
    let artifacts = ArtifactWriter::new(&config.out_dir, config.verbose);
    artifacts.prepare()?;

    let progress = HarvestProgress {
        artifacts: artifacts.clone(),
        pb: ui::spinner("Authenticating"),
    };

    let result = Harvester::new(&config).with_observer(&progress).run().await;
    let outcome = match result {
        Ok(outcome) => {
            progress.pb.finish_and_clear();
            outcome
        }
        Err(e) => {
            progress.pb.abandon_with_message("Failed");
            return Err(e.into());
        }
    };

    let written = write_outputs(&artifacts, &outcome)?;

    print_outcome(&outcome, config.verbose);

    println!();
    ui::info(&format!("Artifacts in {}:", artifacts.out_dir().display()));
    for path in written {
        if let Some(name) = path.file_name() {
            ui::detail(&name.to_string_lossy());
        }
    }
    Ok(())
}

/// Write the message-derived artifacts. The raw chat list is already on disk;
/// a `NoData` run stops there.
fn write_outputs(artifacts: &ArtifactWriter, outcome: &HarvestOutcome) -> Result<Vec<PathBuf>> {
    let mut written = vec![artifacts.path(RAW_CHATS_FILE)];
    if outcome.final_stage == HarvestStage::NoData {
        return Ok(written);
    }
    written.push(artifacts.write_messages(&outcome.messages)?);
    written.extend(artifacts.write_report(&outcome.messages)?);
    Ok(written)
}

fn print_outcome(outcome: &HarvestOutcome, verbose: bool) {
    println!();
    if let Some(bot_id) = &outcome.bot_id {
        ui::info(&format!("Bot: {}", bot_id));
    }
    ui::info(&format!("Chats endpoint: {}", outcome.chats_endpoint.pattern()));

    if outcome.final_stage == HarvestStage::NoData {
        ui::warn(&format!(
            "{} chats listed, none with an identifier. No messages were fetched.",
            outcome.raw_chats.len()
        ));
        return;
    }

    if let Some(endpoint) = &outcome.messages_endpoint {
        ui::info(&format!("Messages endpoint: {}", endpoint.pattern()));
    }

    let harvested = outcome.chats.len() - outcome.skipped.len();
    ui::success(&format!(
        "{} messages from {} chats in {}s",
        outcome.messages.len(),
        harvested,
        outcome.elapsed().num_seconds()
    ));

    if outcome.skipped.is_empty() {
        return;
    }
    ui::warn(&format!(
        "{} of {} chats skipped after fetch errors",
        outcome.skipped.len(),
        outcome.chats.len()
    ));
    if verbose {
        for skipped in &outcome.skipped {
            ui::detail(&format!("{}: {}", skipped.chat_id, skipped.error));
        }
    } else {
        ui::info("Re-run with -v for details.");
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

use anyhow::Result;
use console::style;
use wapull_core::{HarvestConfig, Harvester, ResolvedEndpoint};
use wapull_report::ArtifactWriter;

use crate::ui;

pub async fn run(config: HarvestConfig) -> Result<()> {
    // Verbose probes leave the same endpoint files a harvest would.
    let artifacts = ArtifactWriter::new(&config.out_dir, true);
    let mut harvester = Harvester::new(&config);
    if config.verbose {
        artifacts.prepare()?;
        harvester = harvester.with_observer(&artifacts);
    }

    let spinner = ui::spinner("Resolving endpoints");
    let result = harvester.discover().await;
    spinner.finish_and_clear();
    let report = result?;

    ui::success("Endpoints resolved");
    match &report.bot_id {
        Some(bot_id) => ui::info(&format!("Bot: {}", bot_id)),
        None => ui::info(&format!("Bot: {}", style("none").dim())),
    }
    print_endpoint(&report.chats_endpoint);

    match (&report.messages_endpoint, &report.sample_chat_id) {
        (Some(endpoint), Some(chat_id)) => {
            print_endpoint(endpoint);
            ui::detail(&format!("probed with chat {}", chat_id));
        }
        _ => ui::warn("No chat with an identifier; messages endpoint not probed."),
    }
    Ok(())
}

fn print_endpoint(endpoint: &ResolvedEndpoint) {
    let total = endpoint.capability.candidates().len();
    ui::info(&format!(
        "{}: {} (candidate {} of {})",
        endpoint.capability,
        style(endpoint.pattern()).cyan(),
        endpoint.rank + 1,
        total
    ));
    ui::detail(&endpoint.probe_url);
}

use std::path::{Path, PathBuf};

use anyhow::Result;
use wapull_report::{read_messages, summarize, ArtifactWriter};

use crate::ui;

pub fn run(messages: &Path, out: Option<PathBuf>) -> Result<()> {
    let rows = read_messages(messages)?;
    let out_dir = out.unwrap_or_else(|| default_out_dir(messages));

    let artifacts = ArtifactWriter::new(out_dir, false);
    artifacts.prepare()?;
    let written = artifacts.write_report(&rows)?;

    ui::success(&format!(
        "Summarized {} messages across {} chats",
        rows.len(),
        summarize(&rows).len()
    ));
    for path in written {
        ui::detail(&path.display().to_string());
    }
    Ok(())
}

fn default_out_dir(messages: &Path) -> PathBuf {
    messages
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use wapull_core::MessageRow;

/// One row of `summary_by_chat.csv`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSummary {
    #[serde(rename = "chatId")]
    pub chat_id: String,
    pub msgs: usize,
    pub avg_sentiment: f64,
}

/// Group rows by chat. Ordered by message volume, descending; ties by chat id.
pub fn summarize(rows: &[MessageRow]) -> Vec<ChatSummary> {
    let mut totals: HashMap<&str, (usize, i64)> = HashMap::new();
    for row in rows {
        let entry = totals.entry(row.chat_id.as_str()).or_insert((0, 0));
        entry.0 += 1;
        entry.1 += i64::from(row.sentiment);
    }

    let mut summaries: Vec<ChatSummary> = totals
        .into_iter()
        .map(|(chat_id, (msgs, sum))| ChatSummary {
            chat_id: chat_id.to_string(),
            msgs,
            avg_sentiment: sum as f64 / msgs as f64,
        })
        .collect();
    summaries.sort_by(|a, b| b.msgs.cmp(&a.msgs).then_with(|| a.chat_id.cmp(&b.chat_id)));
    summaries
}

/// Message count per sentiment score, covering every score between the
/// lowest and highest observed (missing scores count 0).
pub fn sentiment_histogram(rows: &[MessageRow]) -> Vec<(i32, usize)> {
    let mut counts = BTreeMap::new();
    for row in rows {
        *counts.entry(row.sentiment).or_insert(0usize) += 1;
    }
    let (Some(&min), Some(&max)) = (counts.keys().next(), counts.keys().next_back()) else {
        return Vec::new();
    };
    (min..=max)
        .map(|score| (score, counts.get(&score).copied().unwrap_or(0)))
        .collect()
}

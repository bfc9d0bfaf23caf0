// SPDX-License-Identifier: CC0-1.0

//! The timeline view: nodes with known `block_time`, sorted chronologically.

use chrono::DateTime;
use trace_engine::{TraceResult, UtxoStatus};

use crate::color::node_color;

const BAR_WIDTH: f64 = 30.0;

fn status_glyph(status: UtxoStatus) -> char {
    match status {
        UtxoStatus::Unspent => '●',
        UtxoStatus::Spent => '○',
        UtxoStatus::Coinbase => '★',
        UtxoStatus::Unknown => '?',
    }
}

fn date_string(block_time: u64) -> String {
    DateTime::from_timestamp(block_time as i64, 0)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "????-??-??".to_string())
}

/// `YYYY-MM-DD │ <bar> <value> <status glyph>` per dated node, oldest first.
pub fn ascii(result: &TraceResult) -> String {
    let mut dated: Vec<_> = result.nodes.iter().filter(|n| n.block_time.is_some()).collect();
    dated.sort_by_key(|n| n.block_time);

    if dated.is_empty() {
        return "(no dated nodes to render)".to_string();
    }

    let max_value = dated.iter().map(|n| n.value_sats).max().unwrap_or(1).max(1);
    let mut out = String::new();
    for node in dated {
        let block_time = node.block_time.expect("filtered above");
        let bar_len = ((BAR_WIDTH * node.value_sats as f64 / max_value as f64).round() as usize).max(1);
        let bar: String = std::iter::repeat('█').take(bar_len).collect();
        out.push_str(&format!(
            "{} │ {bar} {} {}\n",
            date_string(block_time),
            node.value_sats,
            status_glyph(node.status),
        ));
    }
    out
}

/// One Mermaid `timeline` block, one section per dated node.
pub fn mermaid(result: &TraceResult) -> String {
    let mut dated: Vec<_> = result.nodes.iter().filter(|n| n.block_time.is_some()).collect();
    dated.sort_by_key(|n| n.block_time);

    let mut out = String::from("timeline\n");
    for node in dated {
        let date = date_string(node.block_time.expect("filtered above"));
        out.push_str(&format!(
            "    {date} : {} sats ({})\n",
            node.value_sats,
            node_color(node),
        ));
    }
    out
}

/// The same dated, sorted node list as a JSON array.
pub fn json(result: &TraceResult) -> serde_json::Value {
    let mut dated: Vec<_> = result.nodes.iter().filter(|n| n.block_time.is_some()).collect();
    dated.sort_by_key(|n| n.block_time);

    serde_json::json!(dated
        .iter()
        .map(|n| serde_json::json!({
            "txid": n.txid.to_string(),
            "vout": n.vout,
            "date": date_string(n.block_time.expect("filtered above")),
            "value_sats": n.value_sats,
            "status": n.status,
            "color": node_color(n),
        }))
        .collect::<Vec<_>>())
}

/// A minimal standalone HTML page rendering the same timeline as a list.
pub fn html(result: &TraceResult) -> String {
    let mut dated: Vec<_> = result.nodes.iter().filter(|n| n.block_time.is_some()).collect();
    dated.sort_by_key(|n| n.block_time);

    let mut rows = String::new();
    for node in dated {
        rows.push_str(&format!(
            "<li style=\"color:{}\">{} — {} sats ({:?})</li>\n",
            node_color(node),
            date_string(node.block_time.expect("filtered above")),
            node.value_sats,
            node.status,
        ));
    }
    format!("<!doctype html>\n<html><body><ul>\n{rows}</ul></body></html>\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::Txid;
    use trace_engine::{Direction, TraceNode};

    fn txid() -> Txid {
        "11".repeat(32).parse().unwrap()
    }

    fn dated_node(value_sats: u64, block_time: u64, status: UtxoStatus) -> TraceNode {
        TraceNode {
            txid: txid(),
            vout: Some(0),
            value_sats,
            address: None,
            script_type: None,
            status,
            block_height: None,
            block_time: Some(block_time),
            spent_by_txid: None,
            spent_by_vin: None,
            depth: 0,
            coinjoin_score: 0.0,
        }
    }

    fn result_with(nodes: Vec<TraceNode>) -> TraceResult {
        let mut r = TraceResult::new(txid(), Some(0), Direction::Forward, 10, false);
        r.nodes = nodes;
        r
    }

    #[test]
    fn ascii_sorts_chronologically_and_scales_bars() {
        let result = result_with(vec![
            dated_node(50, 2_000, UtxoStatus::Spent),
            dated_node(100, 1_000, UtxoStatus::Unspent),
        ]);
        let text = ascii(&result);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("1970-01-01"));
        assert!(lines[1].contains('●'));
    }

    #[test]
    fn nodes_without_block_time_are_excluded() {
        let mut undated = dated_node(1, 1, UtxoStatus::Unknown);
        undated.block_time = None;
        let result = result_with(vec![undated]);
        assert_eq!(ascii(&result), "(no dated nodes to render)");
    }

    #[test]
    fn json_includes_color_and_date() {
        let result = result_with(vec![dated_node(10, 0, UtxoStatus::Coinbase)]);
        let value = json(&result);
        assert_eq!(value[0]["color"], "purple");
        assert_eq!(value[0]["date"], "1970-01-01");
    }
}

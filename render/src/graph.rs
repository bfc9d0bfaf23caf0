// SPDX-License-Identifier: CC0-1.0

//! The flow-diagram / graph view: nodes and spend edges as discovered by
//! the traversal, independent of chronology.

use trace_engine::TraceResult;

use crate::color::node_color;

fn node_label(txid: &bitcoin::Txid, vout: Option<u32>) -> String {
    let short: String = txid.to_string().chars().take(8).collect();
    match vout {
        Some(v) => format!("{short}:{v}"),
        None => short,
    }
}

/// `{nodes: [...], edges: [...]}`, each node carrying its render colour.
pub fn json(result: &TraceResult) -> serde_json::Value {
    let nodes: Vec<_> = result
        .nodes
        .iter()
        .map(|n| {
            serde_json::json!({
                "id": node_label(&n.txid, n.vout),
                "txid": n.txid.to_string(),
                "vout": n.vout,
                "value_sats": n.value_sats,
                "status": n.status,
                "depth": n.depth,
                "coinjoin_score": n.coinjoin_score,
                "color": node_color(n),
            })
        })
        .collect();
    let edges: Vec<_> = result
        .edges
        .iter()
        .map(|e| {
            serde_json::json!({
                "from": node_label(&e.from_txid, Some(e.from_vout)),
                "to": node_label(&e.to_txid, Some(e.to_vin)),
                "value_sats": e.value_sats,
            })
        })
        .collect();
    serde_json::json!({ "nodes": nodes, "edges": edges })
}

/// A Mermaid `flowchart LR` with per-node colour via `style`.
pub fn mermaid(result: &TraceResult) -> String {
    let mut out = String::from("flowchart LR\n");
    for node in &result.nodes {
        let id = node_label(&node.txid, node.vout);
        out.push_str(&format!("    {id}[\"{id}\\n{} sats\"]\n", node.value_sats));
        out.push_str(&format!("    style {id} fill:{}\n", node_color(node)));
    }
    for edge in &result.edges {
        let from = node_label(&edge.from_txid, Some(edge.from_vout));
        let to = node_label(&edge.to_txid, Some(edge.to_vin));
        out.push_str(&format!("    {from} --> {to}\n"));
    }
    out
}

/// An indented adjacency listing: one line per node, one indented line per
/// outgoing edge.
pub fn ascii(result: &TraceResult) -> String {
    let mut out = String::new();
    for node in &result.nodes {
        out.push_str(&format!(
            "{} {} sats depth={}\n",
            node_label(&node.txid, node.vout),
            node.value_sats,
            node.depth,
        ));
        for edge in result.edges.iter().filter(|e| e.from_txid == node.txid && Some(e.from_vout) == node.vout) {
            out.push_str(&format!(
                "  -> {} ({} sats)\n",
                node_label(&edge.to_txid, Some(edge.to_vin)),
                edge.value_sats,
            ));
        }
    }
    out
}

/// A standalone HTML page with the graph JSON embedded as a `<script>` tag,
/// for a client-side renderer to pick up.
pub fn html(result: &TraceResult) -> String {
    format!(
        "<!doctype html>\n<html><body><script type=\"application/json\" id=\"graph-data\">{}</script></body></html>\n",
        json(result)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::Txid;
    use trace_engine::{Direction, TraceEdge, TraceNode, UtxoStatus};

    fn txid(byte: u8) -> Txid {
        format!("{:02x}", byte).repeat(32).parse().unwrap()
    }

    fn node(byte: u8, depth: u32) -> TraceNode {
        TraceNode {
            txid: txid(byte),
            vout: Some(0),
            value_sats: 1_000,
            address: None,
            script_type: None,
            status: UtxoStatus::Spent,
            block_height: None,
            block_time: None,
            spent_by_txid: None,
            spent_by_vin: None,
            depth,
            coinjoin_score: 0.0,
        }
    }

    #[test]
    fn json_graph_includes_nodes_and_edges() {
        let mut result = TraceResult::new(txid(1), Some(0), Direction::Forward, 5, false);
        result.nodes = vec![node(1, 0), node(2, 1)];
        result.edges = vec![TraceEdge { from_txid: txid(1), from_vout: 0, to_txid: txid(2), to_vin: 0, value_sats: 900 }];

        let value = json(&result);
        assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
        assert_eq!(value["edges"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn mermaid_flowchart_has_arrow_between_nodes() {
        let mut result = TraceResult::new(txid(1), Some(0), Direction::Forward, 5, false);
        result.nodes = vec![node(1, 0), node(2, 1)];
        result.edges = vec![TraceEdge { from_txid: txid(1), from_vout: 0, to_txid: txid(2), to_vin: 0, value_sats: 900 }];

        let text = mermaid(&result);
        assert!(text.starts_with("flowchart LR\n"));
        assert!(text.contains("-->"));
    }

    #[test]
    fn ascii_lists_outgoing_edges_under_their_node() {
        let mut result = TraceResult::new(txid(1), Some(0), Direction::Forward, 5, false);
        result.nodes = vec![node(1, 0)];
        result.edges = vec![TraceEdge { from_txid: txid(1), from_vout: 0, to_txid: txid(2), to_vin: 0, value_sats: 900 }];

        let text = ascii(&result);
        assert!(text.contains("->"));
    }
}

// SPDX-License-Identifier: CC0-1.0

//! The shared colouring rule every renderer uses: CoinJoin red, unspent
//! green, coinbase purple, everything else blue.

use coinjoin::COINJOIN_THRESHOLD;
use trace_engine::{TraceNode, UtxoStatus};

/// CSS/Mermaid-compatible colour name for a traced node.
pub fn node_color(node: &TraceNode) -> &'static str {
    if node.coinjoin_score > COINJOIN_THRESHOLD {
        "red"
    } else if node.status == UtxoStatus::Unspent {
        "green"
    } else if node.status == UtxoStatus::Coinbase {
        "purple"
    } else {
        "blue"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bitcoin::Txid;

    fn txid() -> Txid {
        "00".repeat(32).parse().unwrap()
    }

    fn base_node() -> TraceNode {
        TraceNode {
            txid: txid(),
            vout: Some(0),
            value_sats: 1_000,
            address: None,
            script_type: None,
            status: UtxoStatus::Unknown,
            block_height: None,
            block_time: None,
            spent_by_txid: None,
            spent_by_vin: None,
            depth: 0,
            coinjoin_score: 0.0,
        }
    }

    #[test]
    fn coinjoin_wins_over_status() {
        let mut node = base_node();
        node.status = UtxoStatus::Unspent;
        node.coinjoin_score = 0.95;
        assert_eq!(node_color(&node), "red");
    }

    #[test]
    fn unspent_is_green() {
        let mut node = base_node();
        node.status = UtxoStatus::Unspent;
        assert_eq!(node_color(&node), "green");
    }

    #[test]
    fn coinbase_is_purple() {
        let mut node = base_node();
        node.status = UtxoStatus::Coinbase;
        assert_eq!(node_color(&node), "purple");
    }

    #[test]
    fn everything_else_is_blue() {
        let mut node = base_node();
        node.status = UtxoStatus::Spent;
        assert_eq!(node_color(&node), "blue");
    }
}

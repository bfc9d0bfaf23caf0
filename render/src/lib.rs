// SPDX-License-Identifier: CC0-1.0

//! Stateless formatters turning a [`trace_engine::TraceResult`] into text:
//! an ASCII timeline, a JSON graph, a Mermaid diagram, or an HTML page. Pure
//! transformations; no I/O, no state.

pub mod color;
pub mod graph;
pub mod timeline;

pub use color::node_color;

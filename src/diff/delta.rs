use serde::{Deserialize, Serialize};
use std::fmt;

/// Classifies a patch chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaKind {
    Delete,
    Equal,
    Insert,
}

impl DeltaKind {
    pub fn label(&self) -> &'static str {
        match self {
            DeltaKind::Delete => "-",
            DeltaKind::Equal => "=",
            DeltaKind::Insert => "+",
        }
    }
}

/// One positionally addressed chunk of a diff.
///
/// Line numbers and byte positions are 1-based and point at the start of
/// this chunk in the "from" and "target" texts. The delete and insert chunk
/// of a replacement share the same position pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Delta {
    pub kind: DeltaKind,
    pub line_from: usize,
    pub line_target: usize,
    pub byte_pos_from: u64,
    pub byte_pos_target: u64,
    pub text: String,
}

impl fmt::Display for Delta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{{}:{},{}:{},{}:{}}}",
            self.kind.label(),
            self.line_from,
            self.line_target,
            self.byte_pos_from,
            self.byte_pos_target,
            self.text
        )
    }
}

/// Compact single-line rendering of a delta sequence, mainly for tests
/// and trace output.
pub fn deltas_to_string(deltas: &[Delta]) -> String {
    deltas
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

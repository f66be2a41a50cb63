pub mod delta;
pub mod engine;
pub mod patch;
pub mod render;

pub use delta::{Delta, DeltaKind};
pub use engine::{compute_diff, compute_diff_from_paths, DiffResult};
pub use patch::apply_deltas;
pub use render::{inline_html, pretty_text, side_by_side_html, split_into_hunks};

pub mod duration_secs;
pub mod recommendation;
pub mod regime;
pub mod score;
pub mod signal;
pub mod source_kind;
pub mod weights;

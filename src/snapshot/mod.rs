mod load;
mod model;
mod parse;

pub use load::load_snapshot;
pub use model::{EdgeInput, Point, PointInput, ResultEntry, SanitizeReport, Snapshot, SnapshotEdge};

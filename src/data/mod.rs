//! Historical tick series: CSV loading, preprocessing and label generation.

pub mod labels;
pub mod loader;

pub use labels::{direction_labels, labeled_path, write_labeled_csv};
pub use loader::{
    downsample, ensure_min_ticks, load_series, load_ticks, normalize, normalize_ticks,
    read_ticks, sort_by_timestamp, MIN_TICKS,
};

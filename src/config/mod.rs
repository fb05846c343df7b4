pub mod load;
pub mod save;
pub mod types;

pub use types::{
    Config, MAX_RECENT_PATHS, NUM_SEQUENCES_RANGE, OutputFormat, Quality, SCENE_THRESHOLD_RANGE,
    SEQUENCE_LENGTH_RANGE, UnknownVariant, UserSettings,
};

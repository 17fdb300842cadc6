pub mod engine;
pub mod grid;
pub mod pearson;

pub use engine::{
    CORRELATING_ALERTS_FILE, CorrelationConfig, FILTERED_DATA_FILE, MATRIX_FILE, analyze,
};

use thiserror::Error;

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("missing configuration field '{field}'")]
    MissingField { field: &'static str },

    #[error("invalid number '{value}' for '{field}'")]
    InvalidNumber { field: String, value: String },

    #[error("malformed '{field}' entry: {message}")]
    MalformedEntry { field: String, message: String },

    #[error("parameter '{name}' = {value} must lie in [0, 1]")]
    ParameterOutOfRange { name: &'static str, value: f64 },

    #[error("grid must have positive dimensions, got {width}x{height}")]
    EmptyGrid { width: usize, height: usize },

    #[error("{what} ({x}, {y}) lies outside the {width}x{height} grid")]
    CellOutOfBounds {
        what: String,
        x: i64,
        y: i64,
        width: usize,
        height: usize,
    },

    #[error("{what} cell (row {row}, col {col}) lies outside the {width}x{height} grid")]
    CellOutsideGrid {
        what: String,
        row: usize,
        col: usize,
        width: usize,
        height: usize,
    },

    #[error("cell (row {row}, col {col}) is both a terminal and an obstacle")]
    TerminalObstacleOverlap { row: usize, col: usize },

    #[error("start cell (row {row}, col {col}) is an obstacle")]
    StartOnObstacle { row: usize, col: usize },

    #[error("query line {line}: {message}")]
    InvalidQuery { line: usize, message: String },

    #[error("failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to render plot: {message}")]
    Plot { message: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

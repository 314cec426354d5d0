/// Failures of the slant-edge analysis stages
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("no row of the AOI yields a usable edge observation")]
    InsufficientEdgeSignal,
    #[error("logistic edge fit failed to converge on row #{row}")]
    CurveFitDivergence { row: usize },
    #[error("every resample grid point lost its kernel support")]
    DegenerateResampleGrid,
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("percentile crossing not found, the curve has no usable transition")]
    FlatCurveMetric,
    #[error("through-focus fit needs 3 distinct focus positions, found {found}")]
    InsufficientFocusRange { found: usize },
    #[error("failed to read or write a file")]
    Io(#[from] std::io::Error),
    #[error("failed to read or write the CSV file")]
    Csv(#[from] csv::Error),
    #[error("failed to load the image")]
    Image(#[from] image::ImageError),
}
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn config(msg: impl ToString) -> Self {
        Error::InvalidConfiguration(msg.to_string())
    }
}

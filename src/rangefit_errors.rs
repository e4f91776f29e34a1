use thiserror::Error;

#[derive(Error, Debug)]
pub enum RangefitError {
    #[error("Invalid solver configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid problem input: {0}")]
    Domain(String),

    #[error("Predicted position coincides with the observer at observation {observation}")]
    NumericalSingularity { observation: usize },

    #[error("Linear system is singular (cannot be inverted) at iteration {iteration}")]
    SingularMatrix { iteration: usize },

    #[error("Problem evaluation failed at iteration {iteration}: {source}")]
    Evaluation {
        iteration: usize,
        #[source]
        source: Box<RangefitError>,
    },

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV export error: {0}")]
    CsvError(#[from] csv::Error),
}

impl RangefitError {
    /// Iteration index at which a run aborted, if the error comes from the solver loop.
    pub fn iteration(&self) -> Option<usize> {
        match self {
            RangefitError::SingularMatrix { iteration }
            | RangefitError::Evaluation { iteration, .. } => Some(*iteration),
            _ => None,
        }
    }
}

impl PartialEq for RangefitError {
    fn eq(&self, other: &Self) -> bool {
        use RangefitError::*;
        match (self, other) {
            (InvalidConfiguration(a), InvalidConfiguration(b)) => a == b,
            (Domain(a), Domain(b)) => a == b,
            (
                NumericalSingularity { observation: a },
                NumericalSingularity { observation: b },
            ) => a == b,
            (SingularMatrix { iteration: a }, SingularMatrix { iteration: b }) => a == b,
            (
                Evaluation {
                    iteration: a,
                    source: sa,
                },
                Evaluation {
                    iteration: b,
                    source: sb,
                },
            ) => a == b && sa == sb,

            // not comparable: same variant is enough
            (IoError(_), IoError(_)) => true,
            (CsvError(_), CsvError(_)) => true,

            _ => false,
        }
    }
}

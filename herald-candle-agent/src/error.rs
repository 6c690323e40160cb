//! Errors in the library.
use thiserror::Error;

/// Errors raised by the PPO model.
#[derive(Debug, Error, PartialEq)]
pub enum PpoError {
    /// The observation filter was updated on a model built without one.
    #[error("update_observation_filter called on a model built without an observation filter")]
    ObservationFilterDisabled,

    /// A parameter of the model is not in the given parameter set.
    #[error("parameter {0} is missing")]
    MissingParameter(String),

    /// The given parameter set has a parameter the model does not have.
    #[error("unexpected parameter {0}")]
    UnexpectedParameter(String),

    /// The shape of a given parameter differs from the model.
    #[error("shape of parameter {name} is {given:?}, expected {expected:?}")]
    ShapeMismatch {
        /// Name of the parameter.
        name: String,

        /// Shape in the model.
        expected: Vec<usize>,

        /// Shape in the parameter set.
        given: Vec<usize>,
    },
}

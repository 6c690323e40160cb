use anyhow::Result;

/// Converts the parameters of a model from and to a binary blob.
///
/// Any model passed to [`Broadcaster::broadcast`](crate::Broadcaster::broadcast)
/// or [`ParameterClient::pull`](crate::ParameterClient::pull) implements this trait.
pub trait ParameterSerialize {
    /// Serializes the full parameter set.
    fn parameters_to_binary(&self) -> Result<Vec<u8>>;

    /// Overwrites the parameters with those in `binary`.
    ///
    /// `binary` must have been produced by [`parameters_to_binary`] of a model
    /// with the same structure.
    ///
    /// [`parameters_to_binary`]: ParameterSerialize::parameters_to_binary
    fn binary_to_parameters(&mut self, binary: &[u8]) -> Result<()>;
}

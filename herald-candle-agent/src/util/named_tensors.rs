use crate::error::PpoError;
use anyhow::{anyhow, Result};
use candle_core::{DType, Tensor};
use candle_nn::VarMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named tensors to send model parameters using a channel.
///
/// Each entry holds the shape and the row-major `f32` data of a variable.
/// Entries are ordered by name, so the binary form of a set of parameters
/// does not depend on the order variables were created in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedTensors {
    /// Shape and data of each variable.
    pub named_tensors: BTreeMap<String, (Vec<usize>, Vec<f32>)>,
}

impl NamedTensors {
    /// Copies data of [`VarMap`] to host memory.
    pub fn copy_from(vs: &VarMap) -> Result<Self> {
        let vars = vs
            .data()
            .lock()
            .map_err(|_| anyhow!("variable map lock poisoned"))?;
        let mut named_tensors = BTreeMap::new();

        for (name, var) in vars.iter() {
            let t = var.as_tensor().detach();
            let data = t.flatten_all()?.to_dtype(DType::F32)?.to_vec1::<f32>()?;
            named_tensors.insert(name.clone(), (t.dims().to_vec(), data));
        }

        Ok(Self { named_tensors })
    }

    /// Copies named tensors to [`VarMap`].
    ///
    /// The names and shapes must match the variables of `vs` exactly. Nothing
    /// is written unless they do.
    pub fn copy_to(&self, vs: &VarMap) -> Result<()> {
        let vars = vs
            .data()
            .lock()
            .map_err(|_| anyhow!("variable map lock poisoned"))?;

        if let Some(name) = self.named_tensors.keys().find(|k| !vars.contains_key(*k)) {
            return Err(PpoError::UnexpectedParameter(name.clone()).into());
        }
        for (name, var) in vars.iter() {
            let (shape, _) = self
                .named_tensors
                .get(name)
                .ok_or_else(|| PpoError::MissingParameter(name.clone()))?;
            if shape.as_slice() != var.dims() {
                return Err(PpoError::ShapeMismatch {
                    name: name.clone(),
                    expected: var.dims().to_vec(),
                    given: shape.clone(),
                }
                .into());
            }
        }

        for (name, (shape, data)) in self.named_tensors.iter() {
            // Presence was checked above.
            if let Some(var) = vars.get(name) {
                let t = Tensor::from_slice(data, shape.as_slice(), var.device())?
                    .to_dtype(var.dtype())?;
                var.set(&t)?;
            }
        }

        Ok(())
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.named_tensors.len()
    }

    /// Returns `true` if there is no variable.
    pub fn is_empty(&self) -> bool {
        self.named_tensors.is_empty()
    }

    /// Encodes the named tensors with `bincode`.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decodes named tensors encoded by [`NamedTensors::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

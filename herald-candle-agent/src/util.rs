//! Utilities.
mod named_tensors;
use crate::error::PpoError;
use anyhow::{anyhow, Result};
use candle_nn::VarMap;
use log::trace;
pub use named_tensors::NamedTensors;

/// Copies variables of `src` into the variables of `dest` in place.
///
/// Variables are identified by their names. Only variables of `dest` whose
/// names pass `filter` are copied; each of them must exist in `src` with the
/// same shape. Returns the number of copied variables.
pub fn copy_vars(dest: &VarMap, src: &VarMap, filter: impl Fn(&str) -> bool) -> Result<usize> {
    let dest = dest
        .data()
        .lock()
        .map_err(|_| anyhow!("variable map lock poisoned"))?;
    let src = src
        .data()
        .lock()
        .map_err(|_| anyhow!("variable map lock poisoned"))?;

    // Validate every variable before writing any of them.
    let mut pairs = Vec::new();
    for (name, v_dest) in dest.iter().filter(|(name, _)| filter(name)) {
        let v_src = src
            .get(name)
            .ok_or_else(|| PpoError::MissingParameter(name.clone()))?;
        if v_src.dims() != v_dest.dims() {
            return Err(PpoError::ShapeMismatch {
                name: name.clone(),
                expected: v_dest.dims().to_vec(),
                given: v_src.dims().to_vec(),
            }
            .into());
        }
        pairs.push((name, v_dest, v_src));
    }

    let n = pairs.len();
    for (name, v_dest, v_src) in pairs {
        trace!("copy {}", name);
        v_dest.set(&v_src.as_tensor().to_device(v_dest.device())?)?;
    }

    Ok(n)
}

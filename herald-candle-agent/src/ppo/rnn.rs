//! Recurrent stem shared by the actor and the critic.
use super::RecurrentConfig;
use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use candle_nn::{
    rnn::{lstm, LSTMConfig, LSTMState, LSTM, RNN},
    VarBuilder,
};

/// Hidden and cell states of all layers of the recurrent stem.
///
/// Both tensors have the shape `(num_layers, batch, hidden_size)`.
#[derive(Debug, Clone)]
pub struct RecurrentState {
    /// Hidden state.
    pub hidden: Tensor,

    /// Cell state.
    pub cell: Tensor,
}

impl RecurrentState {
    /// All-zero state.
    pub fn zeros(num_layers: usize, batch: usize, hidden_size: usize, device: &Device) -> Result<Self> {
        let shape = (num_layers, batch, hidden_size);
        Ok(Self {
            hidden: Tensor::zeros(shape, DType::F32, device)?,
            cell: Tensor::zeros(shape, DType::F32, device)?,
        })
    }

    /// Returns a copy of the state cut off from the computation that produced it.
    pub fn detach(&self) -> Self {
        Self {
            hidden: self.hidden.detach(),
            cell: self.cell.detach(),
        }
    }
}

/// Stack of LSTM layers over batch-first sequences.
pub struct RnnStem {
    layers: Vec<LSTM>,
    hidden_size: usize,
}

impl RnnStem {
    /// Builds the layers under the prefix of `vb`.
    pub fn build(vb: VarBuilder, in_dim: usize, config: &RecurrentConfig) -> Result<Self> {
        assert!(config.num_layers > 0, "recurrent stem needs at least one layer");
        let layers = (0..config.num_layers)
            .map(|i| -> Result<LSTM> {
                let in_dim = if i == 0 { in_dim } else { config.hidden_size };
                let layer_config = LSTMConfig {
                    layer_idx: i,
                    ..Default::default()
                };
                Ok(lstm(in_dim, config.hidden_size, layer_config, vb.clone())?)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            layers,
            hidden_size: config.hidden_size,
        })
    }

    /// Runs `(batch, time, in_dim)` sequences from `state`, or from zero.
    ///
    /// Returns the outputs of the last layer, `(batch, time, hidden_size)`,
    /// and the state after the last time step.
    pub fn forward(
        &self,
        xs: &Tensor,
        state: Option<&RecurrentState>,
    ) -> Result<(Tensor, RecurrentState)> {
        let (batch, time, _) = xs.dims3()?;
        assert!(time > 0, "empty sequence");

        let mut xs = xs.clone();
        let mut hidden = Vec::with_capacity(self.layers.len());
        let mut cell = Vec::with_capacity(self.layers.len());

        for (i, layer) in self.layers.iter().enumerate() {
            let init = match state {
                Some(state) => LSTMState::new(state.hidden.get(i)?, state.cell.get(i)?),
                None => layer.zero_state(batch)?,
            };
            let states = layer.seq_init(&xs, &init)?;
            if let Some(last) = states.last() {
                hidden.push(last.h().clone());
                cell.push(last.c().clone());
            }
            xs = layer.states_to_tensor(&states)?;
        }

        let state = RecurrentState {
            hidden: Tensor::stack(&hidden, 0)?,
            cell: Tensor::stack(&cell, 0)?,
        };
        Ok((xs, state))
    }

    /// Number of layers.
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// Size of the hidden state.
    pub fn hidden_size(&self) -> usize {
        self.hidden_size
    }
}

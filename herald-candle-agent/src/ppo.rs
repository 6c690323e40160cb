//! Proximal policy optimization model and agent.
mod agent;
mod config;
mod dist;
mod model;
mod rnn;
mod z_filter;
pub use agent::PpoAgent;
pub use config::{PpoAgentConfig, PpoModelConfig, RecurrentConfig};
pub use dist::{DiagGauss, MIN_LIKELIHOOD};
pub use model::PpoModel;
pub use rnn::{RecurrentState, RnnStem};
pub use z_filter::ZFilter;

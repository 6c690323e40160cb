#![warn(missing_docs)]
//! Core abstractions for running agents on environments.
//!
//! This crate does not depend on any tensor backend. It defines the interfaces
//! that the parameter-server crate and the backend-specific agent crates
//! agree on:
//!
//! * [`Env`] and [`Step`] - the environment step interface,
//! * [`Policy`], [`Agent`] and [`Configurable`] - action selection and construction,
//! * [`AgentMode`] - training or evaluation behaviour of an agent,
//! * [`record`] - key-value records written to a [`Recorder`](record::Recorder).
pub mod error;
pub mod record;

mod base;
pub use base::{Act, Agent, AgentMode, Configurable, Env, Info, Obs, Policy, Step};

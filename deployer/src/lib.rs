//! Deploys contracts step by step and records where they live, per network.

pub mod account;
pub mod calldata;
pub mod client;
pub mod cmd;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod felt;
pub mod op;
pub mod orchestrator;
pub mod provider;
pub mod registry;
pub mod util;

pub use account::{AccountProvider, AccountRef, Signer};
pub use context::NetworkContext;
pub use error::{DeployError, ErrorKind, StepError};
pub use felt::Felt;
pub use orchestrator::{Orchestrator, Step, StepOutcome};
pub use registry::Registry;

//! Deterministic simulation harness for Tephra.
//!
//! Two ways to run an authority against a client without real I/O:
//!
//! - [`scenario`]: a synchronous loopback [`World`] with a virtual clock,
//!   driven by declarative [`Scenario`]s that must end in an oracle.
//! - [`sim_server`] and [`sim_transport`]: the real tokio driver from
//!   `tephra-server` over turmoil's simulated TCP, for end-to-end runs under
//!   latency and loss.
//!
//! Both use [`SimEnv`], so token generation is reproducible from a seed.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod scenario;
pub mod sim_env;
pub mod sim_server;
pub mod sim_transport;

pub use scenario::{OracleFn, RunnableScenario, Scenario, Step, World};
pub use sim_env::SimEnv;
pub use sim_server::{SimAuthority, serve};
pub use sim_transport::{SimSink, SimSource, SimTransport};

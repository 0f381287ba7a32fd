//! Ground-station relay hub: a star-topology TCP switch between a fixed
//! set of named peers. See `SPEC_FULL.md` for the full design; modules
//! below mirror its component breakdown.

pub mod config;
pub mod error;
pub mod frame;
pub mod relaylog;
pub mod router;
pub mod supervisor;
pub mod tcp;
pub mod vertex;

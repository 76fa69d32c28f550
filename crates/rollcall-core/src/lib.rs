//! `rollcall-core`: configuration, shared types and the single-flight flag
//! used by every other rollcall crate.

pub mod config;
pub mod error;
pub mod flight;
pub mod types;

pub use config::{ConfigProvider, FileConfig, MemoryConfig, RollcallConfig};
pub use error::{Result, RollcallError};
pub use flight::{FlightPermit, SingleFlight};
pub use types::{
    AttendanceRecord, DeliveryOptions, DeliveryOverrides, Integration, RunOutcome, SkipReason,
};

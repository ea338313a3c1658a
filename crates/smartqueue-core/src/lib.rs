//! Admission-control middleware: caps concurrent and queued work against
//! live CPU/memory pressure, grounded in spec.md's module layout
//! (Probes, PermitPool, WaitQueue, Dispatcher, AdmissionController).

mod controller;
mod dispatcher;
mod error;
mod layer;
mod options;
mod permit;
mod queue;
mod workitem;

pub mod probes;

pub use controller::{middleware, AdmissionController};
pub use error::Error;
pub use layer::{AdmissionLayer, AdmissionService};
pub use options::{is_exempt_path, Options};
pub use probes::{MemoryDetail, Probes, RealProbes, StubProbes};

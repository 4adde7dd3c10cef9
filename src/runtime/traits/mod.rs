// ABOUTME: Composable capability traits for container engines.
// ABOUTME: Defines ContainerOps, ImageOps, NetworkOps, ExecOps and their union.

mod container;
mod exec;
mod image;
mod network;
mod shared_types;

pub use container::{ContainerError, ContainerFilters, ContainerOps, ContainerSummary};
pub use exec::{ExecError, ExecOps};
pub use image::{ImageError, ImageOps};
pub use network::{NetworkError, NetworkOps};
pub use shared_types::*;

/// Everything the pipeline needs from one engine.
pub trait ContainerEngine: ContainerOps + ImageOps + NetworkOps + ExecOps {}

impl<T> ContainerEngine for T where T: ContainerOps + ImageOps + NetworkOps + ExecOps {}

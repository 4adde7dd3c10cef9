// ABOUTME: Container engine client: capability traits, bollard backend, connector.
// ABOUTME: Also owns the compose-style service definition of a deployment.

mod bollard;
mod compose;
mod connector;
mod error;
mod traits;

pub use self::bollard::BollardEngine;
pub use compose::{
    COMPOSE_FILENAME, COMPOSE_VERSION, ComposeNetwork, ComposeService, ServiceDefinition,
};
pub use connector::{BollardEngineConnector, EngineConnector};
pub use error::{RuntimeError, RuntimeErrorKind};
pub use traits::*;

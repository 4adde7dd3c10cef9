// ABOUTME: Command module aggregator for the deckhand CLI.
// ABOUTME: One handler per subcommand plus the shared service wiring.

mod cancel;
mod context;
mod deploy;
mod logs;
mod run;
mod ssl;
mod status;
mod teardown;

pub use cancel::cancel;
pub use context::{AppContext, load_config};
pub use deploy::deploy;
pub use logs::logs;
pub use run::run;
pub use ssl::ssl;
pub use status::status;
pub use teardown::teardown;

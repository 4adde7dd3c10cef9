// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates deckhand.yml template files.

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::TargetId;

use super::CONFIG_FILENAME;

pub(super) const TEMPLATE: &str = r#"# Where build records, logs and the certificate ledger live
state_dir: .deckhand/state

workspace:
  root: /tmp/build-sources
  retain: 3

queue:
  workers: 2

proxy:
  url: http://localhost:5555
  username: admin
  password:
    env: HAPROXY_PASSWORD
    default: admin
  frontend: http

acme:
  engine: local
  # email: ops@example.com

readiness:
  attempts: 10
  interval: 3s
  timeout: 5s

engines:
  local:
    endpoint: /var/run/docker.sock
    network: deckhand

# sources:
#   github:
#     app:
#       app_id: "12345"
#       installation_id: 67890
#       private_key:
#         env: GITHUB_APP_PRIVATE_KEY

targets:
  my-app:
    repository: my-org/my-app
    branch: main
    engine: local
    build_pack: static
    domain: https://my-app.example.com
    force_ssl: false
"#;

pub fn init_config(dir: &Path, target: Option<&str>, force: bool) -> Result<()> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let yaml = match target {
        Some(name) => {
            let id = TargetId::new(name).map_err(|e| Error::InvalidConfig(e.to_string()))?;
            TEMPLATE
                .replace("  my-app:", &format!("  {}:", id))
                .replace("my-org/my-app", &format!("my-org/{}", id))
                .replace("https://my-app.", &format!("https://{}.", id))
        }
        None => TEMPLATE.to_string(),
    };
    std::fs::write(&config_path, yaml)?;

    Ok(())
}

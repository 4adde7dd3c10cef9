// ABOUTME: Integration tests for configuration parsing and validation.
// ABOUTME: Tests YAML parsing, env-backed secrets, target resolution and file discovery.

use deckhand::config::*;
use deckhand::error::Error;
use deckhand::model::BuildPack;
use deckhand::types::TargetId;
use std::collections::HashMap;
use std::time::Duration;

fn id(name: &str) -> TargetId {
    TargetId::new(name).unwrap()
}

mod parsing {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let yaml = r#"
proxy:
  url: http://haproxy:5555
  password: secret
targets:
  site:
    repository: acme/site
    build_pack: static
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.target_ids(), vec![id("site")]);
        assert_eq!(config.proxy.username, "admin");
        assert_eq!(config.proxy.request_timeout, Duration::from_secs(10));
        assert_eq!(config.restart, RestartPolicy::Always);
        assert_eq!(config.readiness, ReadinessConfig::default());

        let target = config.target(&id("site")).unwrap();
        assert_eq!(target.build_pack, BuildPack::Static);
        assert_eq!(target.engine.name, "local");
        assert!(target.domain.is_none());
        assert!(!target.force_ssl);
    }

    #[test]
    fn parse_full_config() {
        let yaml = r#"
state_dir: /var/lib/deckhand
workspace:
  root: /srv/builds
  retain: 5
queue:
  workers: 4
proxy:
  url: http://haproxy:5555
  username: dataplane
  password: secret
  frontend: https-in
  request_timeout: 30s
acme:
  email: ops@example.com
  staging: true
  renew_after: 30days
readiness:
  attempts: 20
  interval: 500ms
  path: /healthz
timeouts:
  build: 1h
restart: on-failure:5
engines:
  edge:
    endpoint: tcp://10.0.0.5:2375
    network: edge-net
    swarm: true
targets:
  api:
    repository: acme/api
    branch: release
    engine: edge
    build_pack: node
    port: 8080
    install_command: npm ci
    start_command: node server.js
    base_directory: services/api
    domain: https://api.example.com
    preview_domain: "pr-{id}.api.example.com"
    force_ssl: true
    env:
      NODE_ENV: production
  db:
    build_pack: service
    image: postgres:16
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.state_dir, std::path::PathBuf::from("/var/lib/deckhand"));
        assert_eq!(config.workspace.retain, 5);
        assert_eq!(config.queue.workers, 4);
        assert_eq!(config.proxy.frontend, "https-in");
        assert_eq!(config.proxy.request_timeout, Duration::from_secs(30));
        assert!(config.acme.staging);
        assert_eq!(config.acme.renew_after, Duration::from_secs(30 * 86400));
        assert_eq!(config.readiness.attempts, 20);
        assert_eq!(config.readiness.interval, Duration::from_millis(500));
        assert_eq!(config.timeouts.build, Duration::from_secs(3600));
        assert_eq!(config.timeouts.fetch, StageTimeouts::default().fetch);
        assert_eq!(config.restart, RestartPolicy::OnFailure { max_retries: Some(5) });

        let api = config.target(&id("api")).unwrap();
        assert_eq!(api.engine.endpoint, "tcp://10.0.0.5:2375");
        assert_eq!(api.engine.network, "edge-net");
        assert!(api.engine.swarm);
        assert_eq!(api.port, Some(8080));
        assert_eq!(api.source.as_ref().unwrap().branch, "release");
        assert_eq!(api.domain.as_ref().unwrap().host(), "api.example.com");
        assert_eq!(api.preview_domain.as_deref(), Some("pr-{id}.api.example.com"));
        assert!(api.force_ssl);
        assert_eq!(api.env.get("NODE_ENV").map(String::as_str), Some("production"));

        let db = config.target(&id("db")).unwrap();
        assert!(db.source.is_none());
        assert_eq!(db.image.as_deref(), Some("postgres:16"));
    }

    #[test]
    fn empty_domain_means_unrouted() {
        let yaml = r#"
proxy:
  url: http://haproxy:5555
  password: secret
targets:
  worker:
    build_pack: service
    image: acme/worker:latest
    domain: ""
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert!(config.target(&id("worker")).unwrap().domain.is_none());
    }

    #[test]
    fn plain_http_domain_keeps_its_scheme() {
        let yaml = r#"
proxy:
  url: http://haproxy:5555
  password: secret
targets:
  site:
    repository: acme/site
    build_pack: static
    domain: http://site.internal
"#;
        let config = Config::from_yaml(yaml).unwrap();
        let domain = config.target(&id("site")).unwrap().domain.unwrap();
        assert!(!domain.is_https());
        assert_eq!(domain.to_string(), "http://site.internal");
    }

    #[test]
    fn template_parses() {
        let config = Config::from_yaml(Config::template()).unwrap();
        assert_eq!(config.target_ids(), vec![id("my-app")]);
    }
}

mod validation {
    use super::*;

    #[test]
    fn missing_proxy_returns_error() {
        let yaml = r#"
targets:
  site:
    repository: acme/site
    build_pack: static
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn unknown_build_pack_returns_error() {
        let yaml = r#"
proxy:
  url: http://haproxy:5555
  password: secret
targets:
  site:
    repository: acme/site
    build_pack: python
"#;
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn unknown_source_returns_error() {
        let yaml = r#"
proxy:
  url: http://haproxy:5555
  password: secret
targets:
  site:
    source: gitlab
    repository: acme/site
    build_pack: static
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, Error::UnknownSource { ref source_name, .. } if source_name == "gitlab"));
    }

    #[test]
    fn node_target_without_repository_returns_error() {
        let yaml = r#"
proxy:
  url: http://haproxy:5555
  password: secret
targets:
  api:
    build_pack: node
"#;
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("has no repository"));
    }

    #[test]
    fn zero_workers_returns_error() {
        let yaml = r#"
queue:
  workers: 0
proxy:
  url: http://haproxy:5555
  password: secret
"#;
        assert!(matches!(Config::from_yaml(yaml), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn unknown_target_lookup_returns_error() {
        let yaml = r#"
proxy:
  url: http://haproxy:5555
  password: secret
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert!(matches!(config.target(&id("ghost")), Err(Error::UnknownTarget(_))));
    }
}

mod env_vars {
    use super::*;

    #[test]
    fn proxy_password_from_env() {
        let yaml = r#"
proxy:
  url: http://haproxy:5555
  password:
    env: DECKHAND_TEST_PROXY_PASSWORD
"#;
        let config = Config::from_yaml(yaml).unwrap();
        temp_env::with_var("DECKHAND_TEST_PROXY_PASSWORD", Some("hunter2"), || {
            assert_eq!(config.proxy.password.resolve().unwrap(), "hunter2");
        });
        temp_env::with_var_unset("DECKHAND_TEST_PROXY_PASSWORD", || {
            let err = config.proxy.password.resolve().unwrap_err();
            assert!(matches!(err, Error::MissingEnvVar(ref var) if var == "DECKHAND_TEST_PROXY_PASSWORD"));
        });
    }

    #[test]
    fn resolve_env_values() {
        let mut env_map = HashMap::new();
        env_map.insert("KEY".to_string(), EnvValue::Literal("literal".to_string()));
        env_map.insert(
            "FROM_ENV".to_string(),
            EnvValue::FromEnv {
                var: "DECKHAND_TEST_VAR".to_string(),
                default: None,
            },
        );
        env_map.insert(
            "WITH_DEFAULT".to_string(),
            EnvValue::FromEnv {
                var: "DECKHAND_MISSING_VAR".to_string(),
                default: Some("default_value".to_string()),
            },
        );

        temp_env::with_vars(
            [
                ("DECKHAND_TEST_VAR", Some("from_environment")),
                ("DECKHAND_MISSING_VAR", None),
            ],
            || {
                let resolved = resolve_env_map(&env_map).unwrap();
                assert_eq!(resolved["KEY"], "literal");
                assert_eq!(resolved["FROM_ENV"], "from_environment");
                assert_eq!(resolved["WITH_DEFAULT"], "default_value");
            },
        );
    }

    #[test]
    fn target_env_is_resolved_with_the_target() {
        let yaml = r#"
proxy:
  url: http://haproxy:5555
  password: secret
targets:
  site:
    repository: acme/site
    build_pack: static
    env:
      API_TOKEN:
        env: DECKHAND_TEST_API_TOKEN
"#;
        let config = Config::from_yaml(yaml).unwrap();
        temp_env::with_var_unset("DECKHAND_TEST_API_TOKEN", || {
            assert!(matches!(config.target(&id("site")), Err(Error::MissingEnvVar(_))));
        });
        temp_env::with_var("DECKHAND_TEST_API_TOKEN", Some("t0k3n"), || {
            let target = config.target(&id("site")).unwrap();
            assert_eq!(target.env["API_TOKEN"], "t0k3n");
        });
    }

    #[test]
    fn github_app_key_is_resolved_into_the_binding() {
        let yaml = r#"
proxy:
  url: http://haproxy:5555
  password: secret
sources:
  github:
    app:
      app_id: "12345"
      installation_id: 67890
      private_key:
        env: DECKHAND_TEST_APP_KEY
targets:
  site:
    source: github
    repository: acme/site
    build_pack: static
"#;
        let config = Config::from_yaml(yaml).unwrap();
        temp_env::with_var("DECKHAND_TEST_APP_KEY", Some("-----BEGIN KEY-----"), || {
            let source = config.target(&id("site")).unwrap().source.unwrap();
            let app = source.app.unwrap();
            assert_eq!(app.app_id, "12345");
            assert_eq!(app.installation_id, 67890);
            assert_eq!(app.private_key, "-----BEGIN KEY-----");
            assert_eq!(source.html_url, "https://github.com");
        });
    }
}

mod engines {
    use super::*;

    #[test]
    fn shorthand_and_detailed_entries() {
        let yaml = r#"
proxy:
  url: http://haproxy:5555
  password: secret
engines:
  build: build.example.com
  edge:
    endpoint: tcp://10.0.0.5:2375
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.engines["build"].endpoint, "build.example.com");
        assert_eq!(config.engines["edge"].network, DEFAULT_NETWORK);
        assert!(!config.engines["edge"].swarm);
    }

    #[test]
    fn local_engine_is_implied() {
        let yaml = r#"
proxy:
  url: http://haproxy:5555
  password: secret
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.engine("local").unwrap(), EngineConfig::default());
        assert!(config.engine("remote").is_err());
    }
}

mod discovery {
    use super::*;
    use std::fs;

    const YAML: &str = r#"
proxy:
  url: http://haproxy:5555
  password: secret
"#;

    #[test]
    fn finds_each_filename() {
        for name in [CONFIG_FILENAME, CONFIG_FILENAME_ALT, CONFIG_FILENAME_DIR] {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, YAML).unwrap();

            let config = Config::discover(dir.path()).unwrap();
            assert_eq!(config.proxy.url, "http://haproxy:5555", "{name}");
        }
    }

    #[test]
    fn missing_config_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(Config::discover(dir.path()), Err(Error::ConfigNotFound(_))));
    }

    #[test]
    fn init_then_discover() {
        let dir = tempfile::tempdir().unwrap();
        init_config(dir.path(), Some("blog"), false).unwrap();

        let config = Config::discover(dir.path()).unwrap();
        assert_eq!(config.target_ids(), vec![id("blog")]);
        assert!(matches!(
            init_config(dir.path(), None, false),
            Err(Error::AlreadyExists(_))
        ));
        init_config(dir.path(), None, true).unwrap();
    }
}

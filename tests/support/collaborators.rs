// ABOUTME: Fake source fetcher, command runner and certificate issuer.
// ABOUTME: Record what the pipeline asked for; failures are switched on per test.

use async_trait::async_trait;
use deckhand::acme::{Certificate, CertificateIssuer, IssueError};
use deckhand::model::SourceBinding;
use deckhand::source::{
    CommandOutput, CommandRunner, CommandSpec, FetchedSource, SourceError, SourceFetcher,
};
use deckhand::types::{Domain, TargetId};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub const COMMIT: &str = "4f2c9e1d0b7a6c5e3f2a1b0c9d8e7f6a5b4c3d2e";

/// Writes a fixed file tree into the checkout directory.
pub struct FakeFetcher {
    files: Vec<(String, String)>,
    fail: AtomicBool,
    fetched: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeFetcher {
    /// A static site with a built `dist/` directory.
    pub fn static_site() -> Self {
        Self::with_files(&[
            ("package.json", r#"{"name":"site"}"#),
            ("dist/index.html", "<h1>hello</h1>"),
        ])
    }

    pub fn with_files(files: &[(&str, &str)]) -> Self {
        Self {
            files: files
                .iter()
                .map(|(p, c)| (p.to_string(), c.to_string()))
                .collect(),
            fail: AtomicBool::new(false),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Repository and destination of every fetch.
    pub fn fetched(&self) -> Vec<(String, PathBuf)> {
        self.fetched.lock().clone()
    }
}

#[async_trait]
impl SourceFetcher for FakeFetcher {
    async fn fetch(&self, binding: &SourceBinding, dest: &Path) -> Result<FetchedSource, SourceError> {
        self.fetched
            .lock()
            .push((binding.repository.clone(), dest.to_path_buf()));
        if self.fail.load(Ordering::SeqCst) {
            return Err(SourceError::Git {
                operation: "clone",
                exit_code: 128,
                output: format!("fatal: repository '{}' not found", binding.repository),
            });
        }
        for (path, contents) in &self.files {
            let file = dest.join(path);
            if let Some(parent) = file.parent() {
                std::fs::create_dir_all(parent).map_err(spawn_error)?;
            }
            std::fs::write(&file, contents).map_err(spawn_error)?;
        }
        std::fs::create_dir_all(dest).map_err(spawn_error)?;
        Ok(FetchedSource {
            commit: Some(COMMIT.to_string()),
        })
    }
}

fn spawn_error(source: std::io::Error) -> SourceError {
    SourceError::Spawn {
        program: "git".to_string(),
        source,
    }
}

/// Succeeds every command unless told otherwise.
#[derive(Default)]
pub struct FakeRunner {
    failures: Mutex<HashMap<String, CommandOutput>>,
    hang: Mutex<Option<String>>,
    slow: Mutex<Option<(String, Duration)>>,
    calls: Mutex<Vec<CommandSpec>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `command` exit with `exit_code` and print `output`.
    pub fn fail(&self, command: &str, exit_code: i32, output: &str) {
        self.failures.lock().insert(
            command.to_string(),
            CommandOutput {
                exit_code,
                output: output.to_string(),
            },
        );
    }

    /// Make `command` never finish.
    pub fn hang_on(&self, command: &str) {
        *self.hang.lock() = Some(command.to_string());
    }

    /// Make `command` take `delay` before succeeding.
    pub fn slow_on(&self, command: &str, delay: Duration) {
        *self.slow.lock() = Some((command.to_string(), delay));
    }

    /// Display form of every command run so far.
    pub fn commands(&self) -> Vec<String> {
        self.calls.lock().iter().map(CommandSpec::display).collect()
    }

    pub fn calls(&self) -> Vec<CommandSpec> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, SourceError> {
        let command = spec.display();
        self.calls.lock().push(spec.clone());
        let hangs = self.hang.lock().as_deref() == Some(command.as_str());
        if hangs {
            std::future::pending::<()>().await;
        }
        let delay = self
            .slow
            .lock()
            .as_ref()
            .filter(|(slow, _)| *slow == command)
            .map(|(_, delay)| *delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(out) = self.failures.lock().get(&command) {
            return Ok(out.clone());
        }
        Ok(CommandOutput {
            exit_code: 0,
            output: format!("ran {}\n", command),
        })
    }
}

#[derive(Default)]
pub struct FakeIssuer {
    fail: AtomicBool,
    issued: Mutex<Vec<String>>,
}

impl FakeIssuer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Hosts a certificate was requested for.
    pub fn requested(&self) -> Vec<String> {
        self.issued.lock().clone()
    }
}

#[async_trait]
impl CertificateIssuer for FakeIssuer {
    async fn issue(&self, domain: &Domain, _target: &TargetId) -> Result<Certificate, IssueError> {
        self.issued.lock().push(domain.host().to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(IssueError::Rejected {
                domain: domain.host().to_string(),
                exit_code: 1,
            });
        }
        Ok(Certificate::issued_now(domain.host()))
    }
}

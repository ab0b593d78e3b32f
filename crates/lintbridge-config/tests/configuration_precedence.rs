//! Behavioural tests for layered configuration precedence.

use std::cell::RefCell;
use std::ffi::OsString;
use std::fs;
use std::sync::{Mutex, MutexGuard, PoisonError};

use once_cell::sync::Lazy;
use ortho_config::OrthoConfig;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use tempfile::TempDir;

use lintbridge_config::{
    Config, default_engine_entry, default_log_filter, default_log_format, default_timeout_secs,
};

const TIMEOUT_ENV: &str = "LINTBRIDGE_TIMEOUT_SECS";

static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

struct Harness {
    temp_dir: TempDir,
    cli_args: RefCell<Vec<OsString>>,
    env_overrides: RefCell<Vec<(String, Option<OsString>)>>,
    loaded: RefCell<Option<Config>>,
    error: RefCell<Option<String>>,
    _env_guard: MutexGuard<'static, ()>,
}

impl Harness {
    fn new() -> Self {
        let env_guard = ENV_MUTEX.lock().unwrap_or_else(PoisonError::into_inner);
        let temp_dir = match TempDir::new() {
            Ok(dir) => dir,
            Err(error) => panic!("failed to create temporary directory: {error}"),
        };
        Self {
            temp_dir,
            cli_args: RefCell::new(vec![OsString::from("lintbridge")]),
            env_overrides: RefCell::new(Vec::new()),
            loaded: RefCell::new(None),
            error: RefCell::new(None),
            _env_guard: env_guard,
        }
    }

    fn write_config(&self, timeout_secs: u64) {
        let path = self.temp_dir.path().join("lintbridge.toml");
        if let Err(error) = fs::write(&path, format!("timeout_secs = {timeout_secs}\n")) {
            panic!("failed to write configuration: {error}");
        }

        let mut args = self.cli_args.borrow_mut();
        args.push(OsString::from("--config-path"));
        args.push(path.into_os_string());
    }

    fn set_env(&self, key: &str, value: &str) {
        let previous = std::env::var_os(key);
        // Environment mutation is `unsafe` on edition 2024; the harness holds
        // `ENV_MUTEX` and restores every override in `Drop`.
        unsafe { std::env::set_var(key, value) };
        self.env_overrides
            .borrow_mut()
            .push((key.to_owned(), previous));
    }

    fn push_cli_arg(&self, arg: impl Into<OsString>) {
        self.cli_args.borrow_mut().push(arg.into());
    }

    fn load(&self) {
        if self.loaded.borrow().is_some() || self.error.borrow().is_some() {
            return;
        }

        let args = self.cli_args.borrow().clone();
        match Config::load_from_iter(args) {
            Ok(config) => *self.loaded.borrow_mut() = Some(config),
            Err(error) => *self.error.borrow_mut() = Some(error.to_string()),
        }
    }

    fn loaded_config(&self) -> Config {
        self.load();
        if let Some(error) = self.error.borrow().as_ref() {
            panic!("configuration failed to load: {error}");
        }
        match self.loaded.borrow().as_ref() {
            Some(config) => config.clone(),
            None => panic!("configuration was not loaded"),
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let mut overrides = self.env_overrides.borrow_mut();
        while let Some((key, value)) = overrides.pop() {
            match value {
                Some(os_value) => unsafe { std::env::set_var(&key, os_value) },
                None => unsafe { std::env::remove_var(&key) },
            }
        }
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[given("a configuration file setting the timeout to {seconds} seconds")]
fn given_configuration_file(harness: &Harness, seconds: u64) {
    harness.write_config(seconds);
}

#[given("the environment overrides the timeout to {seconds} seconds")]
fn given_environment_override(harness: &Harness, seconds: u64) {
    harness.set_env(TIMEOUT_ENV, &seconds.to_string());
}

#[when("the CLI sets the timeout to {seconds} seconds")]
fn when_cli_override(harness: &Harness, seconds: u64) {
    harness.push_cli_arg("--timeout-secs");
    harness.push_cli_arg(seconds.to_string());
}

#[when("the configuration loads without overrides")]
fn when_load_without_overrides(harness: &Harness) {
    harness.load();
}

#[then("loading the configuration resolves the timeout to {seconds} seconds")]
fn then_resolved_timeout(harness: &Harness, seconds: u64) {
    let config = harness.loaded_config();
    assert_eq!(config.timeout_secs, seconds);
}

#[then("loading the configuration applies the built-in defaults")]
fn then_defaults_applied(harness: &Harness) {
    let config = harness.loaded_config();
    assert_eq!(config.timeout_secs, default_timeout_secs());
    assert_eq!(config.engine_entry, default_engine_entry());
    assert_eq!(config.log_filter(), default_log_filter());
    assert_eq!(config.log_format(), default_log_format());
    assert!(config.bundle_archive.is_none());
    assert!(config.runtime_command.is_none());
}

#[scenario(path = "tests/features/configuration_precedence.feature")]
fn configuration_precedence(#[from(harness)] harness: Harness) {
    let _ = harness;
}

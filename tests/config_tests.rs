use eventplanner::{
    AppConfig,
    config::{ConfigError, DEFAULT_BIND_ADDR, DEFAULT_GEOCODING_URL, Env},
};
use serial_test::serial;
use std::{env, panic};

const VARS: &[&str] = &[
    "APP_ENV",
    "DATABASE_URL",
    "JWT_SECRET",
    "BIND_ADDR",
    "GEOCODING_URL",
];

/// Runs `test` with the given variables set (and every other config variable
/// unset), restoring the original environment afterwards.
fn with_env<T, R>(vars: &[(&str, &str)], test: T) -> R
where
    T: FnOnce() -> R + panic::UnwindSafe,
{
    let originals: Vec<(&str, Option<String>)> =
        VARS.iter().map(|&var| (var, env::var(var).ok())).collect();

    unsafe {
        for var in VARS {
            env::remove_var(var);
        }
        for (key, value) in vars {
            env::set_var(key, value);
        }
    }

    let result = panic::catch_unwind(test);

    unsafe {
        for (key, original) in originals {
            match original {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
        }
    }

    match result {
        Ok(value) => value,
        Err(e) => panic::resume_unwind(e),
    }
}

#[test]
#[serial]
fn production_requires_jwt_secret() {
    let result = with_env(
        &[("APP_ENV", "production"), ("DATABASE_URL", "postgres://u:p@h/db")],
        AppConfig::load,
    );
    assert_eq!(result.err(), Some(ConfigError::Missing("JWT_SECRET")));
}

#[test]
#[serial]
fn production_rejects_empty_jwt_secret() {
    let result = with_env(
        &[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://u:p@h/db"),
            ("JWT_SECRET", ""),
        ],
        AppConfig::load,
    );
    assert_eq!(result.err(), Some(ConfigError::Missing("JWT_SECRET")));
}

#[test]
#[serial]
fn database_url_is_always_required() {
    let result = with_env(&[("APP_ENV", "local")], AppConfig::load);
    assert_eq!(result.err(), Some(ConfigError::Missing("DATABASE_URL")));
}

#[test]
#[serial]
fn production_with_secret_loads() {
    let config = with_env(
        &[
            ("APP_ENV", "production"),
            ("DATABASE_URL", "postgres://u:p@h/db"),
            ("JWT_SECRET", "prod-secret"),
            ("BIND_ADDR", "127.0.0.1:8080"),
        ],
        AppConfig::load,
    )
    .unwrap();

    assert_eq!(config.env, Env::Production);
    assert_eq!(config.jwt_secret, "prod-secret");
    assert_eq!(config.bind_addr, "127.0.0.1:8080");
    assert!(config.secure_cookies());
}

#[test]
#[serial]
fn local_generates_a_random_secret_and_defaults() {
    let (first, second, ephemeral) = with_env(
        &[("DATABASE_URL", "postgres://u:p@h/db")],
        || {
            (
                AppConfig::load().unwrap(),
                AppConfig::load().unwrap(),
                AppConfig::secret_is_ephemeral(),
            )
        },
    );

    assert_eq!(first.env, Env::Local);
    assert!(ephemeral);
    assert_eq!(first.jwt_secret.len(), 48);
    assert_ne!(first.jwt_secret, second.jwt_secret);
    assert_eq!(first.bind_addr, DEFAULT_BIND_ADDR);
    assert_eq!(first.geocoding_url, DEFAULT_GEOCODING_URL);
    assert!(!first.secure_cookies());
}

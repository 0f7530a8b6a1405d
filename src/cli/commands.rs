//! CLI command implementations
//!
//! Each subcommand runs one store operation and yields a JSON value for
//! the response envelope. Expected conditions (missing file, unknown id)
//! are data, not errors: only I/O faults, corruption, bad arguments and
//! cipher failures end with a non-zero exit.

use serde_json::{json, Value};

use super::args::{Cli, Command};
use super::config::Config;
use super::errors::{CliError, CliErrorCode, CliResult};
use super::io::{write_error, write_response};
use crate::cipher::{AesGcmTransform, ValueTransform};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::storage::{pairs_to_fields, FixedStore, FlexStore, Listing, Outcome};

/// Run the CLI with parsed arguments
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();

    let config = Config::load(&cli.config)?.with_overrides(cli.db, cli.flex_db)?;
    let severity = if cli.verbose {
        config.log_severity().min(Severity::Info)
    } else {
        config.log_severity()
    };
    Logger::set_min_severity(severity);
    log_event_with_fields(
        Event::ConfigLoaded,
        &[
            ("db_path", config.db_path.as_str()),
            ("flex_db_path", config.flex_db_path.as_str()),
            ("log_level", severity.as_str()),
        ],
    );

    match run_command(&config, cli.command) {
        Ok(data) => write_response(data),
        Err(e) => {
            log_event_with_fields(
                Event::CommandFailed,
                &[("code", e.code_str()), ("message", e.message())],
            );
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Store handles built from configuration.
struct Stores {
    fixed: FixedStore,
    flex: FlexStore,
}

impl Stores {
    fn from_config(config: &Config) -> Self {
        Self {
            fixed: FixedStore::with_options(config.db_path(), config.store),
            flex: FlexStore::with_options(config.flex_db_path(), config.store),
        }
    }
}

/// Execute a command and return the response payload
pub fn run_command(config: &Config, command: Command) -> CliResult<Value> {
    let stores = Stores::from_config(config);
    let fixed = &stores.fixed;
    let flex = &stores.flex;

    match command {
        Command::Create { flex: on_flex } => Ok(outcome_json(if on_flex {
            flex.create_db()?
        } else {
            fixed.create_db()?
        })),
        Command::Delete { flex: on_flex } => Ok(outcome_json(if on_flex {
            flex.delete_db()?
        } else {
            fixed.delete_db()?
        })),
        Command::Copy { to, flex: on_flex } => Ok(outcome_json(if on_flex {
            flex.copy_db(&to)?
        } else {
            fixed.copy_db(&to)?
        })),
        Command::Empty { flex: on_flex } => Ok(outcome_json(if on_flex {
            flex.empty_db()?
        } else {
            fixed.empty_db()?
        })),

        Command::Add { key, data } => Ok(match fixed.insert(&key, &data)? {
            Some(record) => json!({ "added": true, "record": record }),
            None => json!({ "added": false }),
        }),
        Command::Get { id, format } => Ok(Value::String(fixed.select_by_id(id, &format)?)),
        Command::Modify { id, key, data } => Ok(outcome_json(fixed.modify(id, &key, &data)?)),
        Command::Remove { id } => Ok(outcome_json(fixed.remove(id)?)),

        Command::Count { flex: on_flex } => {
            let count = if on_flex {
                flex.count_size()?
            } else {
                fixed.count_size()?
            };
            Ok(json!(count))
        }
        Command::First { format, flex: on_flex } => Ok(Value::String(if on_flex {
            flex.first_flex_field(&format)?
        } else {
            fixed.first_field(&format)?
        })),
        Command::Last { format, flex: on_flex } => Ok(Value::String(if on_flex {
            flex.last_flex_field(&format)?
        } else {
            fixed.last_field(&format)?
        })),
        Command::FirstN { n, format, flex: on_flex } => Ok(listing_json(if on_flex {
            flex.first_x_flex_fields(n, &format)?
        } else {
            fixed.first_x_fields(n, &format)?
        })),
        Command::LastN { n, format, flex: on_flex } => Ok(listing_json(if on_flex {
            flex.last_x_flex_fields(n, &format)?
        } else {
            fixed.last_x_fields(n, &format)?
        })),
        Command::Search { query, format } => Ok(listing_json(fixed.search(&query, &format)?)),

        Command::FlexAdd { key, pairs } => {
            let fields = pairs_to_fields(&pairs)
                .map_err(|c| CliError::new(CliErrorCode::InvalidArgument, c.to_string()))?;
            Ok(match flex.insert(&key, fields)? {
                Some(record) => json!({ "added": true, "record": record }),
                None => json!({ "added": false }),
            })
        }
        Command::FlexGet { id, format } => Ok(Value::String(flex.select_flex_by_id(id, &format)?)),
        Command::FlexField { id, name } => Ok(Value::String(flex.get_flex_field(id, &name)?)),
        Command::FlexFields { id } => Ok(json!(flex.list_flex_fields(id)?)),
        Command::FlexModify { id, key, pairs } => {
            let fields = pairs_to_fields(&pairs)
                .map_err(|c| CliError::new(CliErrorCode::InvalidArgument, c.to_string()))?;
            Ok(outcome_json(flex.modify_flex_field(id, &key, fields)?))
        }
        Command::FlexRemove { id } => Ok(outcome_json(flex.remove_flex_field(id)?)),
        Command::FlexSearch { query, format } => {
            Ok(listing_json(flex.select_flex_search(&query, &format)?))
        }

        Command::Encrypt { text, key } => Ok(Value::String(AesGcmTransform.transform(&text, &key)?)),
        Command::Decrypt { text, key } => Ok(Value::String(AesGcmTransform.inverse(&text, &key)?)),

        Command::Version => Ok(json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": crate::VERSION
        })),
    }
}

fn outcome_json(outcome: Outcome) -> Value {
    json!({
        "status": outcome.status,
        "message": outcome.message
    })
}

/// Records are embedded as JSON; a condition message stays a string.
fn listing_json(listing: Listing) -> Value {
    let records = serde_json::from_str::<Value>(&listing.body)
        .unwrap_or_else(|_| Value::String(listing.body.clone()));
    json!({
        "format": listing.format,
        "records": records
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> Config {
        Config {
            db_path: dir.path().join("tardigrade.db").to_string_lossy().into_owned(),
            flex_db_path: dir.path().join("flexible.db").to_string_lossy().into_owned(),
            ..Config::default()
        }
    }

    #[test]
    fn test_add_then_get() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);

        let added = run_command(
            &config,
            Command::Add { key: "user:1".into(), data: "hello".into() },
        )
        .unwrap();
        assert_eq!(added["added"], true);
        assert_eq!(added["record"]["id"], 1);

        let value = run_command(&config, Command::Get { id: 1, format: "value".into() }).unwrap();
        assert_eq!(value, "hello");
    }

    #[test]
    fn test_conditions_are_data() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);

        let got = run_command(&config, Command::Get { id: 1, format: "raw".into() }).unwrap();
        assert!(got.as_str().unwrap().ends_with(" missing!"));

        let removed = run_command(&config, Command::Remove { id: 1 }).unwrap();
        assert_eq!(removed["status"], false);

        let listed = run_command(
            &config,
            Command::Search { query: "x".into(), format: "json".into() },
        )
        .unwrap();
        assert!(listed["records"].is_string());
    }

    #[test]
    fn test_listing_embeds_records() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        for key in ["a", "b", "c"] {
            run_command(&config, Command::Add { key: key.into(), data: "v".into() }).unwrap();
        }
        let listed = run_command(
            &config,
            Command::LastN { n: 2, format: "json".into(), flex: false },
        )
        .unwrap();
        assert_eq!(listed["format"], "json");
        let records = listed["records"].as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["key"], "b");
    }

    #[test]
    fn test_flex_add_odd_pairs_is_error() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let err = run_command(
            &config,
            Command::FlexAdd { key: "k".into(), pairs: vec!["name".into()] },
        )
        .unwrap_err();
        assert_eq!(err.code_str(), "TG_CLI_INVALID_ARGUMENT");
        assert!(!dir.path().join("flexible.db").exists());
    }

    #[test]
    fn test_flex_commands() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        run_command(
            &config,
            Command::FlexAdd {
                key: "user:1".into(),
                pairs: vec!["name".into(), "ricardo".into(), "city".into(), "london".into()],
            },
        )
        .unwrap();

        let names = run_command(&config, Command::FlexFields { id: 1 }).unwrap();
        assert_eq!(names, json!(["city", "name"]));

        let city = run_command(&config, Command::FlexField { id: 1, name: "city".into() }).unwrap();
        assert_eq!(city, "london");

        let count = run_command(&config, Command::Count { flex: true }).unwrap();
        assert_eq!(count, 1);
        assert!(!dir.path().join("tardigrade.db").exists());
    }

    #[test]
    fn test_cipher_round_trip_and_failure() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let secret = run_command(
            &config,
            Command::Encrypt { text: "payload".into(), key: "k".into() },
        )
        .unwrap();
        let plain = run_command(
            &config,
            Command::Decrypt { text: secret.as_str().unwrap().into(), key: "k".into() },
        )
        .unwrap();
        assert_eq!(plain, "payload");

        let err = run_command(
            &config,
            Command::Decrypt { text: secret.as_str().unwrap().into(), key: "other".into() },
        )
        .unwrap_err();
        assert_eq!(err.code_str(), "TG_CLI_CIPHER_ERROR");
    }

    #[test]
    fn test_version() {
        let dir = TempDir::new().unwrap();
        let version = run_command(&config(&dir), Command::Version).unwrap();
        assert_eq!(version["version"], crate::VERSION);
    }
}

use super::args::*;
use promptline_core::config::Settings;
use promptline_core::storage::Store;
use promptline_core::{PromptRegistry, RolloutError};
use serde::Serialize;

pub mod ab;
pub mod outcome;
pub mod resolve;
pub mod status;
pub mod versions;

pub mod exit_codes {
    pub const OK: i32 = 0;
    pub const CONFIG_ERROR: i32 = 2;
    pub const VALIDATION: i32 = 2;
    pub const NOT_FOUND: i32 = 3;
    pub const STORE_UNAVAILABLE: i32 = 4;
    pub const INTEGRITY: i32 = 5;
}

pub type Registry = PromptRegistry<Store>;

pub fn dispatch(cli: Cli, settings: &Settings) -> anyhow::Result<i32> {
    if let Command::Version = cli.cmd {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(exit_codes::OK);
    }

    let reg = match open_registry(settings) {
        Ok(reg) => reg,
        Err(e) => {
            let message = format!("{e:#}");
            tracing::error!(
                event = "store_open_failed",
                db = %settings.db.display(),
                error = %message,
            );
            return emit_error(
                "E_STORE_UNAVAILABLE",
                &message,
                true,
                exit_codes::STORE_UNAVAILABLE,
            );
        }
    };

    let res = match cli.cmd {
        Command::Create(args) => versions::cmd_create(&reg, args),
        Command::List(args) => versions::cmd_list(&reg, args),
        Command::Show(args) => versions::cmd_show(&reg, args),
        Command::Lineage(args) => versions::cmd_lineage(&reg, args),
        Command::Activate(args) => versions::cmd_activate(&reg, args),
        Command::Resolve(args) => resolve::cmd_resolve(&reg, args),
        Command::Ab(args) => match args.cmd {
            AbSub::Start(a) => ab::cmd_start(&reg, a),
            AbSub::Status(a) => ab::cmd_status(&reg, a),
            AbSub::Conclude(a) => ab::cmd_conclude(&reg, a),
        },
        Command::Outcome(args) => match args.cmd {
            OutcomeSub::Record(a) => outcome::cmd_record(&reg, a),
        },
        Command::Status => status::cmd_status(&reg, settings),
        Command::Version => Ok(exit_codes::OK),
    };

    match res {
        Ok(code) => Ok(code),
        Err(e) => report(&e),
    }
}

fn open_registry(settings: &Settings) -> anyhow::Result<Registry> {
    let store = Store::open(&settings.db)?;
    store.set_busy_timeout(settings.busy_timeout_ms)?;
    store.init_schema()?;
    Ok(PromptRegistry::with_settings(store, settings))
}

/// Prints `value` as pretty JSON on stdout.
pub fn emit<T: Serialize>(value: &T) -> anyhow::Result<i32> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(exit_codes::OK)
}

pub fn exit_code_for(err: &RolloutError) -> i32 {
    match err {
        RolloutError::Validation(_) => exit_codes::VALIDATION,
        RolloutError::NotFound(_) => exit_codes::NOT_FOUND,
        RolloutError::StoreUnavailable(_) => exit_codes::STORE_UNAVAILABLE,
        RolloutError::Integrity(_) => exit_codes::INTEGRITY,
    }
}

fn report(err: &anyhow::Error) -> anyhow::Result<i32> {
    match err.downcast_ref::<RolloutError>() {
        Some(e) => {
            if matches!(e, RolloutError::Integrity(_)) {
                tracing::error!(event = "integrity_violation", error = %e);
            }
            emit_error(e.code(), &e.to_string(), e.is_retryable(), exit_code_for(e))
        }
        // Anything else is bad input the core never saw (unreadable files).
        None => emit_error(
            "E_VALIDATION",
            &format!("{err:#}"),
            false,
            exit_codes::VALIDATION,
        ),
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    retryable: bool,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error: ErrorBody<'a>,
}

pub fn emit_error(code: &str, message: &str, retryable: bool, exit: i32) -> anyhow::Result<i32> {
    let envelope = ErrorEnvelope {
        error: ErrorBody {
            code,
            message,
            retryable,
        },
    };
    println!("{}", serde_json::to_string(&envelope)?);
    Ok(exit)
}

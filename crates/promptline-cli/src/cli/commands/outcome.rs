use super::{emit, Registry};
use crate::cli::args::{OutcomeRecordArgs, OutcomeResultArg};
use anyhow::Result;
use promptline_core::model::{OutcomeResult, TaskOutcome};

pub fn cmd_record(reg: &Registry, args: OutcomeRecordArgs) -> Result<i32> {
    let result = match args.result {
        OutcomeResultArg::Success => OutcomeResult::Success,
        OutcomeResultArg::Failure => OutcomeResult::Failure,
        OutcomeResultArg::Partial => OutcomeResult::Partial,
        OutcomeResultArg::Abandoned => OutcomeResult::Abandoned,
    };

    let mut outcome = TaskOutcome::new(args.version_id, result, args.confidence);
    if let Some(ms) = args.duration_ms {
        outcome = outcome.with_duration(ms);
    }
    if let Some(tokens) = args.tokens {
        outcome = outcome.with_tokens(tokens);
    }

    reg.store().record_outcome(&outcome)?;
    emit(&outcome)
}

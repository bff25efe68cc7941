use super::{emit, Registry};
use crate::cli::args::{AbConcludeArgs, AbStartArgs, DecisionArg, ScopeArgs};
use anyhow::Result;
use promptline_core::state::Decision;

pub fn cmd_start(reg: &Registry, args: AbStartArgs) -> Result<i32> {
    emit(&reg.start_ab_test(&args.challenger, args.split, args.min_tasks)?)
}

pub fn cmd_status(reg: &Registry, args: ScopeArgs) -> Result<i32> {
    emit(&reg.ab_test_state(&args.role, args.model.as_deref())?)
}

pub fn cmd_conclude(reg: &Registry, args: AbConcludeArgs) -> Result<i32> {
    let decision = match args.decision {
        DecisionArg::Promote => Decision::Promote,
        DecisionArg::Rollback => Decision::Rollback,
    };
    emit(&reg.conclude_ab_test(&args.scope.role, args.scope.model.as_deref(), decision)?)
}

use super::{emit, Registry};
use crate::cli::args::ResolveArgs;
use anyhow::Result;
use promptline_core::model::Sample;
use promptline_core::RolloutError;
use rand::Rng;

pub fn cmd_resolve(reg: &Registry, args: ResolveArgs) -> Result<i32> {
    let sample = match args.sample {
        Some(s) => Sample::new(s)?,
        // Fresh draw per request; routing is not sticky.
        None => Sample::new(rand::rng().random_range(0..100u8))?,
    };

    let model = args.scope.model.as_deref();
    match reg.resolve_active(&args.scope.role, model, sample)? {
        Some(resolution) => emit(&resolution),
        None => Err(RolloutError::not_found(format!(
            "no active version for {}/{}",
            args.scope.role,
            model.unwrap_or("*")
        ))
        .into()),
    }
}

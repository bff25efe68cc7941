use super::{emit, Registry};
use crate::cli::args::{CreateArgs, IdArgs, ScopeArgs};
use anyhow::{Context, Result};
use promptline_core::model::NewVersion;
use promptline_core::RolloutError;
use std::fs;

pub fn cmd_create(reg: &Registry, args: CreateArgs) -> Result<i32> {
    let content = match (args.content, args.content_file) {
        (Some(text), _) => text,
        (None, Some(path)) => fs::read_to_string(&path)
            .with_context(|| format!("failed to read content file: {}", path.display()))?,
        (None, None) => {
            return Err(
                RolloutError::validation("one of --content or --content-file is required").into(),
            )
        }
    };

    let mut req = NewVersion::new(args.scope.role, content);
    if let Some(model) = args.scope.model {
        req = req.model(model);
    }
    if let Some(parent) = args.parent {
        req = req.parent(parent);
    }
    if let Some(summary) = args.summary {
        req = req.summary(summary);
    }
    if let Some(author) = args.author {
        req = req.author(author);
    }

    emit(&reg.create_version(req)?)
}

pub fn cmd_list(reg: &Registry, args: ScopeArgs) -> Result<i32> {
    emit(&reg.list_versions(&args.role, args.model.as_deref())?)
}

pub fn cmd_show(reg: &Registry, args: IdArgs) -> Result<i32> {
    emit(&reg.get_version(&args.id)?)
}

pub fn cmd_lineage(reg: &Registry, args: IdArgs) -> Result<i32> {
    emit(&reg.lineage(&args.id)?)
}

pub fn cmd_activate(reg: &Registry, args: IdArgs) -> Result<i32> {
    emit(&reg.activate_version(&args.id)?)
}

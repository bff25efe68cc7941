use crate::errors::Result;
use crate::model::{AbVariant, PromptVersion, Sample, Scope, SplitPercent};
use crate::storage::{ActiveOrPair, VersionStore};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub version: PromptVersion,
    pub ab_test: bool,
    pub ab_variant: Option<AbVariant>,
}

/// Challenger iff `sample < split`. With a uniform sample over 0..100 this
/// routes `split` percent of calls to the challenger.
pub fn choose_variant(split: SplitPercent, sample: Sample) -> AbVariant {
    if sample.get() < split.get() {
        AbVariant::Challenger
    } else {
        AbVariant::Control
    }
}

pub fn resolve(state: Option<ActiveOrPair>, sample: Sample) -> Option<Resolution> {
    match state? {
        ActiveOrPair::Active(version) => Some(Resolution {
            version,
            ab_test: false,
            ab_variant: None,
        }),
        ActiveOrPair::Pair {
            control,
            challenger,
        } => {
            // A pair without a split never leaves the store (see from_versions);
            // treating it as 0 keeps all traffic on control.
            let split = challenger.ab_split_percent.unwrap_or(SplitPercent::ZERO);
            let variant = choose_variant(split, sample);
            let version = match variant {
                AbVariant::Challenger => challenger,
                AbVariant::Control => control,
            };
            Some(Resolution {
                version,
                ab_test: true,
                ab_variant: Some(variant),
            })
        }
    }
}

pub struct Resolver<'a, S: VersionStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: VersionStore + ?Sized> Resolver<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// `Ok(None)` means the scope has no version configured yet.
    pub fn resolve_active(&self, scope: &Scope, sample: Sample) -> Result<Option<Resolution>> {
        let state = self.store.active_or_pair(scope)?;
        let resolution = resolve(state, sample);

        match &resolution {
            Some(r) => tracing::debug!(
                event = "prompt_resolved",
                scope = %scope,
                id = %r.version.id,
                version = r.version.version,
                variant = ?r.ab_variant,
                sample = sample.get(),
            ),
            None => tracing::debug!(event = "prompt_unresolved", scope = %scope),
        }
        Ok(resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AbStatus;
    use chrono::Utc;

    fn version(id: &str, status: AbStatus, split: Option<u8>) -> PromptVersion {
        PromptVersion {
            id: id.into(),
            role: "dev".into(),
            model: Some("kimi".into()),
            version: 1,
            content: "x".into(),
            content_sha256: String::new(),
            change_summary: None,
            parent_version_id: None,
            created_by: "test".into(),
            active: status != AbStatus::Challenger,
            created_at: Utc::now(),
            ab_status: status,
            ab_split_percent: split.map(|s| SplitPercent::new(s).unwrap()),
            ab_started_at: None,
            ab_min_tasks: None,
        }
    }

    fn pair(split: u8) -> ActiveOrPair {
        ActiveOrPair::Pair {
            control: version("control", AbStatus::Control, Some(split)),
            challenger: version("challenger", AbStatus::Challenger, Some(split)),
        }
    }

    fn samples() -> impl Iterator<Item = Sample> {
        (0u8..100).map(|s| Sample::new(s).unwrap())
    }

    #[test]
    fn test_stable_scope_returns_active() {
        let r = resolve(
            Some(ActiveOrPair::Active(version("v1", AbStatus::None, None))),
            Sample::new(3).unwrap(),
        )
        .unwrap();
        assert_eq!(r.version.id, "v1");
        assert!(!r.ab_test);
        assert_eq!(r.ab_variant, None);
    }

    #[test]
    fn test_empty_scope_is_absent() {
        assert!(resolve(None, Sample::new(0).unwrap()).is_none());
    }

    #[test]
    fn test_split_zero_never_selects_challenger() {
        for s in samples() {
            let r = resolve(Some(pair(0)), s).unwrap();
            assert_eq!(r.ab_variant, Some(AbVariant::Control));
            assert_eq!(r.version.id, "control");
        }
    }

    #[test]
    fn test_split_hundred_never_selects_control() {
        for s in samples() {
            let r = resolve(Some(pair(100)), s).unwrap();
            assert_eq!(r.ab_variant, Some(AbVariant::Challenger));
            assert_eq!(r.version.id, "challenger");
        }
    }

    #[test]
    fn test_challenger_iff_sample_below_split() {
        for p in [1u8, 20, 50, 99] {
            let split = SplitPercent::new(p).unwrap();
            for s in samples() {
                let expected = if s.get() < p {
                    AbVariant::Challenger
                } else {
                    AbVariant::Control
                };
                assert_eq!(choose_variant(split, s), expected, "split={p} sample={}", s.get());
            }
        }
    }

    #[test]
    fn test_each_sample_value_routes_exactly_split_share() {
        let challenger_hits = samples()
            .filter(|s| resolve(Some(pair(20)), *s).unwrap().ab_variant == Some(AbVariant::Challenger))
            .count();
        assert_eq!(challenger_hits, 20);
    }
}

//! Constructor selection and invocation.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use command_bind_core::{
    BindError, BoundArgument, CommandSettings, ConstructorArguments, ConstructorMetadata, Instance,
    SettingsMetadata, TypeKey, TypeResolver,
};
use tracing::debug;

use super::lookup::ValueLookup;
use crate::model::ParameterId;

/// A satisfiable constructor with its counts.
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub constructor: Arc<ConstructorMetadata>,
    /// Parameters satisfied by bound values.
    pub score: usize,
    /// Parameters satisfied by bound values, defaults or services.
    pub satisfied: usize,
}

/// Services resolved while scoring, reused at invocation.
pub(crate) type ServiceCache = HashMap<TypeKey, Instance>;

/// Scores every satisfiable constructor, best first.
pub(crate) fn rank_constructors(
    metadata: &SettingsMetadata,
    lookup: &ValueLookup,
    resolver: &dyn TypeResolver,
    cache: &mut ServiceCache,
) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = metadata
        .constructors
        .iter()
        .filter_map(|constructor| score(constructor, lookup, resolver, cache))
        .collect();
    candidates.sort_by(|a, b| b.score.cmp(&a.score).then(b.satisfied.cmp(&a.satisfied)));

    for candidate in &candidates {
        debug!(
            settings = %metadata.settings_type.short_name(),
            constructor = %candidate.constructor.signature(metadata.settings_type.short_name()),
            score = candidate.score,
            satisfied = candidate.satisfied,
            "scored constructor"
        );
    }
    candidates
}

fn score(
    constructor: &Arc<ConstructorMetadata>,
    lookup: &ValueLookup,
    resolver: &dyn TypeResolver,
    cache: &mut ServiceCache,
) -> Option<Candidate> {
    let mut score = 0;
    let mut satisfied = 0;
    for parameter in &constructor.parameters {
        if lookup.has_parameter_with_name(&parameter.name) {
            score += 1;
            satisfied += 1;
        } else if parameter.default_value.is_some() {
            satisfied += 1;
        } else if cache.contains_key(&parameter.parameter_type) {
            satisfied += 1;
        } else if let Some(instance) = resolver.resolve(&parameter.parameter_type) {
            cache.insert(parameter.parameter_type.clone(), instance);
            satisfied += 1;
        } else {
            return None;
        }
    }
    Some(Candidate {
        constructor: constructor.clone(),
        score,
        satisfied,
    })
}

/// Candidates tied with the best on both counts.
pub(crate) fn ties<'c>(candidates: &'c [Candidate]) -> Vec<&'c Candidate> {
    let Some(best) = candidates.first() else {
        return Vec::new();
    };
    candidates
        .iter()
        .filter(|candidate| candidate.score == best.score && candidate.satisfied == best.satisfied)
        .collect()
}

/// Invokes `constructor`, returning the instance and the parameters whose
/// values it consumed.
pub(crate) fn invoke(
    constructor: &ConstructorMetadata,
    lookup: &ValueLookup,
    resolver: &dyn TypeResolver,
    cache: &ServiceCache,
) -> Result<(Box<dyn CommandSettings>, HashSet<ParameterId>), BindError> {
    let mut arguments = ConstructorArguments::new();
    let mut consumed = HashSet::new();
    for parameter in &constructor.parameters {
        let argument = if let Some(entry) = lookup.value_for_name(&parameter.name) {
            consumed.insert(entry.parameter);
            BoundArgument::Value(entry.value.clone())
        } else if let Some(instance) = cache.get(&parameter.parameter_type) {
            BoundArgument::Service(instance.clone())
        } else if let Some(default) = &parameter.default_value {
            BoundArgument::Value(default.clone())
        } else {
            let instance = resolver
                .resolve(&parameter.parameter_type)
                .ok_or_else(|| BindError::CouldNotResolveType(parameter.type_name.clone()))?;
            BoundArgument::Service(instance)
        };
        arguments.push(parameter.name.clone(), argument);
    }
    Ok((constructor.invoke(arguments)?, consumed))
}

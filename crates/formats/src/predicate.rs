use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;

use serde_json::Value;

use crate::feature::{Feature, FeatureCollection};

/// Raised by a predicate that cannot decide (missing property, wrong type).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateError {
    pub message: String,
}

impl PredicateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for PredicateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "predicate failed: {}", self.message)
    }
}

impl std::error::Error for PredicateError {}

pub type PredicateResult = Result<bool, PredicateError>;

/// Shared per-feature predicate.
pub type FeaturePredicate = Rc<dyn Fn(&Feature) -> PredicateResult>;

/// Runs `predicate` on one feature. A panicking predicate is reported as
/// an error instead of unwinding into the caller.
pub fn evaluate(
    predicate: &dyn Fn(&Feature) -> PredicateResult,
    feature: &Feature,
) -> PredicateResult {
    catch_unwind(AssertUnwindSafe(|| predicate(feature)))
        .unwrap_or_else(|_| Err(PredicateError::new("predicate panicked")))
}

/// Fail-closed evaluation: an error counts as "excluded".
pub fn evaluate_fail_closed(
    predicate: &dyn Fn(&Feature) -> PredicateResult,
    feature: &Feature,
) -> bool {
    evaluate(predicate, feature).unwrap_or(false)
}

/// First feature the predicate accepts; erroring features never match.
pub fn first_match<'a>(
    collection: &'a FeatureCollection,
    predicate: &dyn Fn(&Feature) -> PredicateResult,
) -> Option<&'a Feature> {
    collection
        .features
        .iter()
        .find(|f| evaluate_fail_closed(predicate, f))
}

/// Features the predicate accepts, with the number that errored.
pub fn filter_fail_closed<'a>(
    collection: &'a FeatureCollection,
    predicate: &dyn Fn(&Feature) -> PredicateResult,
) -> (Vec<&'a Feature>, usize) {
    let mut errors = 0;
    let mut kept = Vec::new();
    for feature in &collection.features {
        match evaluate(predicate, feature) {
            Ok(true) => kept.push(feature),
            Ok(false) => {}
            Err(_) => errors += 1,
        }
    }
    (kept, errors)
}

/// Matches features whose `key` property equals `expected`. A missing
/// property is an error, not a mismatch.
pub fn property_equals(key: impl Into<String>, expected: Value) -> FeaturePredicate {
    let key = key.into();
    Rc::new(move |feature: &Feature| -> PredicateResult {
        let value = feature
            .property(&key)
            .ok_or_else(|| PredicateError::new(format!("missing property {key:?}")))?;
        Ok(value == &expected)
    })
}

/// Matches features whose string property `key` is one of `allowed`.
pub fn property_in(key: impl Into<String>, allowed: Vec<String>) -> FeaturePredicate {
    let key = key.into();
    Rc::new(move |feature: &Feature| -> PredicateResult {
        let value = feature
            .property_str(&key)
            .ok_or_else(|| PredicateError::new(format!("property {key:?} is not a string")))?;
        Ok(allowed.iter().any(|a| a == value))
    })
}

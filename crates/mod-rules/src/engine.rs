//! Rule-set evaluation.

use mailrule_domain::{EmailRecord, MatchPredicate, RuleSet};
use mailrule_error::MailError;

use crate::condition::evaluate_condition;

/// Combines every condition of `rule_set` under its All/Any predicate.
///
/// All conditions are evaluated even when the verdict is already known, so a
/// malformed date anywhere in the set is always reported. An empty set is
/// true under `All` and false under `Any`.
pub fn evaluate(record: &EmailRecord, rule_set: &RuleSet) -> Result<bool, MailError> {
    let results = rule_set
        .conditions
        .iter()
        .map(|cond| evaluate_condition(record, cond))
        .collect::<Result<Vec<bool>, MailError>>()?;

    Ok(match rule_set.predicate {
        MatchPredicate::All => results.iter().all(|&hit| hit),
        MatchPredicate::Any => results.iter().any(|&hit| hit),
    })
}

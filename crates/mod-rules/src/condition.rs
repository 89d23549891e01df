//! Single-condition matching against an email record.

use mailrule_domain::{Condition, ConditionField, ConditionPredicate, EmailRecord};
use mailrule_error::MailError;

use crate::date::{parse_message_date, parse_rule_date};

/// Tests one field/predicate/value triple against a record.
///
/// Text comparisons ignore case. Date comparisons work on calendar dates and
/// fail with [`MailError::DateParse`] when either side cannot be read. A
/// field/predicate pair outside the known table evaluates to `false`.
pub fn evaluate_condition(record: &EmailRecord, condition: &Condition) -> Result<bool, MailError> {
    use ConditionPredicate::*;

    if condition.field == ConditionField::ReceivedDate {
        return match condition.predicate {
            LessThan | GreaterThan => {
                let received = parse_message_date(&record.date)?;
                let bound = parse_rule_date(&condition.value)?;
                Ok(match condition.predicate {
                    LessThan => received < bound,
                    _ => received > bound,
                })
            }
            _ => Ok(false),
        };
    }

    let Some(field_value) = text_field(record, &condition.field) else {
        return Ok(false);
    };
    let field_value = field_value.to_lowercase();
    let value = condition.value.to_lowercase();

    Ok(match condition.predicate {
        Contains => field_value.contains(&value),
        NotContains => !field_value.contains(&value),
        Equals => field_value == value,
        NotEquals => field_value != value,
        LessThan | GreaterThan | Other(_) => false,
    })
}

fn text_field<'a>(record: &'a EmailRecord, field: &ConditionField) -> Option<&'a str> {
    match field {
        ConditionField::Sender => Some(&record.sender),
        ConditionField::Subject => Some(&record.subject),
        ConditionField::Snippet => Some(&record.snippet),
        ConditionField::ReceivedDate | ConditionField::Other(_) => None,
    }
}

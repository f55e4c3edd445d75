//! Filter conditions.
//!
//! A [`Condition`] names a wire field, an [`Operator`] and the raw value(s)
//! as they appeared in the URL. Coercion into typed statement arguments
//! happens later, in the SQL builder, once the field's logical type is
//! known.

use tabula_core::Error;

/// Filter operators, as recognised by the URL value patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Neq,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    StartsWith,
    EndsWith,
    Contains,
    NotContains,
    ContainsAny,
    Empty,
    NotEmpty,
    Null,
    NotNull,
}

/// How many values an operator consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    /// One scalar value.
    Scalar,
    /// A set of values.
    Set,
    /// No value; the operator is self-contained.
    Flag,
}

impl Operator {
    pub fn arity(self) -> Arity {
        match self {
            Operator::Eq
            | Operator::Neq
            | Operator::Lt
            | Operator::Le
            | Operator::Gt
            | Operator::Ge
            | Operator::StartsWith
            | Operator::EndsWith
            | Operator::Contains
            | Operator::NotContains => Arity::Scalar,
            Operator::In | Operator::NotIn | Operator::ContainsAny => Arity::Set,
            Operator::Empty | Operator::NotEmpty | Operator::Null | Operator::NotNull => {
                Arity::Flag
            }
        }
    }

    /// Operators that compare text renderings rather than typed values.
    pub fn is_text_match(self) -> bool {
        matches!(
            self,
            Operator::StartsWith
                | Operator::EndsWith
                | Operator::Contains
                | Operator::NotContains
                | Operator::ContainsAny
        )
    }
}

/// The value attached to a condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionValue {
    Scalar(String),
    Set(Vec<String>),
    None,
}

/// One parsed filter: field (wire name), operator, raw value(s).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: ConditionValue,
}

impl Condition {
    pub fn scalar(field: impl Into<String>, operator: Operator, value: impl Into<String>) -> Self {
        Condition {
            field: field.into(),
            operator,
            value: ConditionValue::Scalar(value.into()),
        }
    }

    pub fn set(field: impl Into<String>, operator: Operator, values: Vec<String>) -> Self {
        Condition {
            field: field.into(),
            operator,
            value: ConditionValue::Set(values),
        }
    }

    pub fn flag(field: impl Into<String>, operator: Operator) -> Self {
        Condition {
            field: field.into(),
            operator,
            value: ConditionValue::None,
        }
    }

    /// Check value shape against operator arity. Scalars must be non-empty
    /// and sets must have at least one member.
    pub fn validate(&self) -> Result<(), Error> {
        let ok = match (self.operator.arity(), &self.value) {
            (Arity::Scalar, ConditionValue::Scalar(s)) => !s.is_empty(),
            (Arity::Set, ConditionValue::Set(vs)) => !vs.is_empty(),
            (Arity::Flag, ConditionValue::None) => true,
            _ => false,
        };
        if ok {
            Ok(())
        } else {
            Err(Error::user(format!(
                "invalid filter value for field: {}",
                self.field
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scalars_are_invalid() {
        assert!(Condition::scalar("a", Operator::Gt, "").validate().is_err());
        assert!(Condition::scalar("a", Operator::Gt, "5").validate().is_ok());
    }

    #[test]
    fn empty_sets_are_invalid() {
        assert!(Condition::set("a", Operator::In, vec![]).validate().is_err());
        assert!(Condition::set("a", Operator::In, vec!["x".into()])
            .validate()
            .is_ok());
    }

    #[test]
    fn arity_mismatch_is_invalid() {
        let bad = Condition {
            field: "a".to_string(),
            operator: Operator::Null,
            value: ConditionValue::Scalar("x".to_string()),
        };
        assert!(bad.validate().is_err());
        assert!(Condition::flag("a", Operator::Null).validate().is_ok());
    }
}

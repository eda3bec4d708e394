//! Comparison expressions turning a matched value into a truth

use crate::error::ProtocolError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;
use zobot_domain::FactValue;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `>`
    Gt,
    /// `<=`
    Le,
    /// `>=`
    Ge,
    /// `in`: equal to one of the listed values
    In,
    /// `out`: equal to none of the listed values
    Out,
    /// `<>`: inclusive between two bounds
    Between,
    /// `><`: outside two bounds
    Outside,
}

impl CompareOp {
    /// Protocol symbol
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Gt => ">",
            CompareOp::Le => "<=",
            CompareOp::Ge => ">=",
            CompareOp::In => "in",
            CompareOp::Out => "out",
            CompareOp::Between => "<>",
            CompareOp::Outside => "><",
        }
    }

    fn takes_list(self) -> bool {
        matches!(
            self,
            CompareOp::In | CompareOp::Out | CompareOp::Between | CompareOp::Outside
        )
    }
}

impl FromStr for CompareOp {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let op = match s.trim() {
            "=" | "==" => CompareOp::Eq,
            "!=" => CompareOp::Ne,
            "<" => CompareOp::Lt,
            ">" => CompareOp::Gt,
            "<=" => CompareOp::Le,
            ">=" => CompareOp::Ge,
            "in" => CompareOp::In,
            "out" => CompareOp::Out,
            "<>" => CompareOp::Between,
            "><" => CompareOp::Outside,
            other => {
                return Err(ProtocolError::InvalidExpression(format!(
                    "unknown operator '{}'",
                    other
                )))
            }
        };
        Ok(op)
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Expression as written in a protocol: `{"op": ">", "values": 100}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ExpressionSpec {
    /// Operator symbol
    pub op: String,
    /// Threshold scalar or list
    pub values: FactValue,
}

/// A validated comparison against fixed thresholds
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    op: CompareOp,
    thresholds: Vec<FactValue>,
}

impl Expression {
    /// Build an expression, checking the thresholds fit the operator
    pub fn new(op: CompareOp, values: FactValue) -> Result<Self, ProtocolError> {
        let thresholds = match values {
            FactValue::List(items) => items,
            // a missing bound never compares, so the expression stays false
            FactValue::Range(lo, hi) => [lo, hi]
                .into_iter()
                .map(|b| b.map_or(FactValue::Range(None, None), FactValue::Number))
                .collect(),
            scalar => vec![scalar],
        };

        match op {
            CompareOp::Between | CompareOp::Outside if thresholds.len() != 2 => {
                Err(ProtocolError::InvalidExpression(format!(
                    "'{}' needs exactly two bounds, got {}",
                    op,
                    thresholds.len()
                )))
            }
            CompareOp::In | CompareOp::Out if thresholds.is_empty() => Err(
                ProtocolError::InvalidExpression(format!("'{}' needs at least one value", op)),
            ),
            _ if !op.takes_list() && thresholds.len() != 1 => {
                Err(ProtocolError::InvalidExpression(format!(
                    "'{}' needs a single threshold, got {}",
                    op,
                    thresholds.len()
                )))
            }
            _ => Ok(Self { op, thresholds }),
        }
    }

    /// Build from the protocol form
    pub fn from_spec(spec: &ExpressionSpec) -> Result<Self, ProtocolError> {
        Self::new(spec.op.parse()?, spec.values.clone())
    }

    /// Operator
    pub fn op(&self) -> CompareOp {
        self.op
    }

    /// Threshold values
    pub fn thresholds(&self) -> &[FactValue] {
        &self.thresholds
    }

    /// Evaluate against a matched value
    ///
    /// Collections evaluate against their first present element. Operands
    /// that cannot be compared make the expression false.
    pub fn evaluate(&self, input: &FactValue) -> bool {
        let Some(x) = input.leading() else {
            return false;
        };
        let cmp = |t: &FactValue| x.compare(t);

        match self.op {
            CompareOp::Eq => cmp(&self.thresholds[0]) == Some(Ordering::Equal),
            CompareOp::Ne => matches!(cmp(&self.thresholds[0]), Some(o) if o != Ordering::Equal),
            CompareOp::Lt => cmp(&self.thresholds[0]) == Some(Ordering::Less),
            CompareOp::Gt => cmp(&self.thresholds[0]) == Some(Ordering::Greater),
            CompareOp::Le => matches!(cmp(&self.thresholds[0]), Some(o) if o != Ordering::Greater),
            CompareOp::Ge => matches!(cmp(&self.thresholds[0]), Some(o) if o != Ordering::Less),
            CompareOp::In => self.thresholds.iter().any(|t| x.loosely_equals(t)),
            CompareOp::Out => {
                let comparable: Vec<Ordering> = self.thresholds.iter().filter_map(cmp).collect();
                !comparable.is_empty() && !comparable.contains(&Ordering::Equal)
            }
            CompareOp::Between => match (cmp(&self.thresholds[0]), cmp(&self.thresholds[1])) {
                (Some(lo), Some(hi)) => lo != Ordering::Less && hi != Ordering::Greater,
                _ => false,
            },
            CompareOp::Outside => match (cmp(&self.thresholds[0]), cmp(&self.thresholds[1])) {
                (Some(lo), Some(hi)) => lo == Ordering::Less || hi == Ordering::Greater,
                _ => false,
            },
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.thresholds.iter().map(|v| v.to_string()).collect();
        write!(f, "{} {}", self.op, values.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zobot_domain::EntityId;

    fn expr(op: &str, values: FactValue) -> Expression {
        Expression::new(op.parse().unwrap(), values).unwrap()
    }

    fn num(n: f64) -> FactValue {
        FactValue::Number(n)
    }

    fn list(items: &[f64]) -> FactValue {
        FactValue::List(items.iter().copied().map(FactValue::Number).collect())
    }

    #[test]
    fn test_scalar_operators() {
        assert!(expr(">", num(100.0)).evaluate(&num(101.0)));
        assert!(!expr(">", num(100.0)).evaluate(&num(100.0)));
        assert!(expr(">=", num(100.0)).evaluate(&num(100.0)));
        assert!(expr("<", num(100.0)).evaluate(&num(99.5)));
        assert!(expr("<=", num(100.0)).evaluate(&num(100.0)));
        assert!(expr("=", num(3.0)).evaluate(&num(3.0)));
        assert!(expr("!=", num(3.0)).evaluate(&num(4.0)));
    }

    #[test]
    fn test_between_and_outside() {
        let between = expr("<>", list(&[97.0, 99.0]));
        assert!(between.evaluate(&num(97.0)));
        assert!(between.evaluate(&num(99.0)));
        assert!(!between.evaluate(&num(99.1)));

        let outside = expr("><", list(&[97.0, 99.0]));
        assert!(outside.evaluate(&num(100.0)));
        assert!(!outside.evaluate(&num(98.0)));
    }

    #[test]
    fn test_membership() {
        let colours = FactValue::List(vec![
            FactValue::Text("red".into()),
            FactValue::Text("green".into()),
        ]);
        assert!(expr("in", colours.clone()).evaluate(&FactValue::Text("red".into())));
        assert!(!expr("in", colours.clone()).evaluate(&FactValue::Text("blue".into())));
        assert!(expr("out", colours).evaluate(&FactValue::Text("blue".into())));
    }

    #[test]
    fn test_membership_matches_entity_ids() {
        let rash = FactValue::Entity(EntityId::new(2, 1, "RASH"));
        let e = expr("in", FactValue::List(vec![FactValue::Text("RASH".into())]));
        assert!(e.evaluate(&rash));
    }

    #[test]
    fn test_collections_use_first_present_element() {
        let e = expr(">", num(100.0));
        assert!(e.evaluate(&FactValue::Range(None, Some(101.0))));
        assert!(e.evaluate(&list(&[101.0, 50.0])));
        assert!(!e.evaluate(&FactValue::Range(None, None)));
    }

    #[test]
    fn test_incomparable_is_false() {
        assert!(!expr(">", num(100.0)).evaluate(&FactValue::Text("hot".into())));
        assert!(!expr("!=", num(100.0)).evaluate(&FactValue::Bool(true)));
        assert!(!expr("out", list(&[1.0])).evaluate(&FactValue::Text("x".into())));
    }

    #[test]
    fn test_construction_errors() {
        assert!(matches!(
            "~".parse::<CompareOp>(),
            Err(ProtocolError::InvalidExpression(_))
        ));
        assert!(Expression::new(CompareOp::Between, num(1.0)).is_err());
        assert!(Expression::new(CompareOp::Between, list(&[1.0, 2.0, 3.0])).is_err());
        assert!(Expression::new(CompareOp::Gt, list(&[1.0, 2.0])).is_err());
        assert!(Expression::new(CompareOp::In, FactValue::List(vec![])).is_err());
    }

    #[test]
    fn test_from_spec_json() {
        let spec: ExpressionSpec = serde_json::from_str(r#"{"op": "<>", "values": [1, 5]}"#).unwrap();
        let e = Expression::from_spec(&spec).unwrap();
        assert_eq!(e.op(), CompareOp::Between);
        assert_eq!(e.to_string(), "<> 1,5");
    }
}

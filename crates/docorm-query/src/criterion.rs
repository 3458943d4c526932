//! Query criteria.
//!
//! A [`Criterion`] tree is the logical form of a query predicate. Leaves name
//! a property (a dotted path from the root entity) and carry either a literal
//! [`Value`] or a [`BindingParameter`] that is resolved when the compiled
//! query runs.

use docorm_proto::{BindingSource, Value};

/// A value bound at execution time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BindingParameter {
    /// Parameter name.
    pub name: Option<String>,
    /// Index of the call argument supplying the value.
    pub argument_index: Option<u32>,
    /// Property path read from the argument.
    pub argument_path: Option<Vec<String>>,
    /// Whether a collection argument expands into several values.
    pub expandable: bool,
}

impl BindingParameter {
    /// A parameter read from call argument `index`.
    pub fn argument(index: u32) -> Self {
        Self {
            argument_index: Some(index),
            ..Self::default()
        }
    }

    /// A parameter identified by name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Read `path` from the argument instead of using it whole.
    pub fn with_argument_path(mut self, path: &str) -> Self {
        self.argument_path = Some(path.split('.').map(String::from).collect());
        self
    }

    /// Mark the parameter as expandable.
    pub fn expandable(mut self) -> Self {
        self.expandable = true;
        self
    }

    pub(crate) fn source(&self) -> BindingSource {
        BindingSource {
            name: self.name.clone(),
            argument_index: self.argument_index,
            argument_path: self.argument_path.clone(),
        }
    }
}

/// Right-hand side of a property criterion.
#[derive(Debug, Clone, PartialEq)]
pub enum CriterionValue {
    /// A value known at compile time.
    Literal(Value),
    /// A value bound at execution time.
    Parameter(BindingParameter),
}

impl From<Value> for CriterionValue {
    fn from(value: Value) -> Self {
        CriterionValue::Literal(value)
    }
}

impl From<BindingParameter> for CriterionValue {
    fn from(parameter: BindingParameter) -> Self {
        CriterionValue::Parameter(parameter)
    }
}

impl From<&str> for CriterionValue {
    fn from(value: &str) -> Self {
        CriterionValue::Literal(value.into())
    }
}

impl From<i64> for CriterionValue {
    fn from(value: i64) -> Self {
        CriterionValue::Literal(value.into())
    }
}

impl From<bool> for CriterionValue {
    fn from(value: bool) -> Self {
        CriterionValue::Literal(value.into())
    }
}

/// Operator of a property-to-property comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEquals,
    LessThan,
    LessThanEquals,
}

impl ComparisonOp {
    /// Document operator for this comparison.
    pub fn operator(&self) -> &'static str {
        match self {
            ComparisonOp::Equals => "$eq",
            ComparisonOp::NotEquals => "$ne",
            ComparisonOp::GreaterThan => "$gt",
            ComparisonOp::GreaterThanEquals => "$gte",
            ComparisonOp::LessThan => "$lt",
            ComparisonOp::LessThanEquals => "$lte",
        }
    }

    fn criterion_name(&self) -> &'static str {
        match self {
            ComparisonOp::Equals => "EqualsProperty",
            ComparisonOp::NotEquals => "NotEqualsProperty",
            ComparisonOp::GreaterThan => "GreaterThanProperty",
            ComparisonOp::GreaterThanEquals => "GreaterThanEqualsProperty",
            ComparisonOp::LessThan => "LessThanProperty",
            ComparisonOp::LessThanEquals => "LessThanEqualsProperty",
        }
    }
}

/// A node of a criterion tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Criterion {
    /// Every child must hold.
    Conjunction(Vec<Criterion>),
    /// At least one child must hold.
    Disjunction(Vec<Criterion>),
    /// No child may hold.
    Negation(Vec<Criterion>),
    Equals {
        property: String,
        value: CriterionValue,
    },
    NotEquals {
        property: String,
        value: CriterionValue,
    },
    GreaterThan {
        property: String,
        value: CriterionValue,
    },
    GreaterThanEquals {
        property: String,
        value: CriterionValue,
    },
    LessThan {
        property: String,
        value: CriterionValue,
    },
    LessThanEquals {
        property: String,
        value: CriterionValue,
    },
    IsNull {
        property: String,
    },
    IsNotNull {
        property: String,
    },
    IsTrue {
        property: String,
    },
    IsFalse {
        property: String,
    },
    /// The identity equals `value`.
    IdEquals(CriterionValue),
    /// The version property equals `value`.
    VersionEquals(CriterionValue),
    /// The property is one of `value`, an array literal or an expandable
    /// parameter.
    In {
        property: String,
        value: CriterionValue,
    },
    /// The property is none of `value`.
    NotIn {
        property: String,
        value: CriterionValue,
    },
    /// Inclusive range.
    Between {
        property: String,
        from: CriterionValue,
        to: CriterionValue,
    },
    Regex {
        property: String,
        value: CriterionValue,
    },
    /// The property is an empty string or missing.
    IsEmpty {
        property: String,
    },
    /// The property is present and not an empty string.
    IsNotEmpty {
        property: String,
    },
    /// Compares two properties of the same document.
    PropertyComparison {
        op: ComparisonOp,
        property: String,
        other: String,
    },
    Like {
        property: String,
        value: CriterionValue,
    },
    SizeEquals {
        property: String,
        value: CriterionValue,
    },
}

impl Criterion {
    /// `property == value`.
    pub fn eq(property: impl Into<String>, value: impl Into<CriterionValue>) -> Self {
        Criterion::Equals {
            property: property.into(),
            value: value.into(),
        }
    }

    /// `property != value`.
    pub fn ne(property: impl Into<String>, value: impl Into<CriterionValue>) -> Self {
        Criterion::NotEquals {
            property: property.into(),
            value: value.into(),
        }
    }

    /// `property > value`.
    pub fn gt(property: impl Into<String>, value: impl Into<CriterionValue>) -> Self {
        Criterion::GreaterThan {
            property: property.into(),
            value: value.into(),
        }
    }

    /// `property >= value`.
    pub fn gte(property: impl Into<String>, value: impl Into<CriterionValue>) -> Self {
        Criterion::GreaterThanEquals {
            property: property.into(),
            value: value.into(),
        }
    }

    /// `property < value`.
    pub fn lt(property: impl Into<String>, value: impl Into<CriterionValue>) -> Self {
        Criterion::LessThan {
            property: property.into(),
            value: value.into(),
        }
    }

    /// `property <= value`.
    pub fn lte(property: impl Into<String>, value: impl Into<CriterionValue>) -> Self {
        Criterion::LessThanEquals {
            property: property.into(),
            value: value.into(),
        }
    }

    /// `property` is one of `value`.
    pub fn is_in(property: impl Into<String>, value: impl Into<CriterionValue>) -> Self {
        Criterion::In {
            property: property.into(),
            value: value.into(),
        }
    }

    /// `from <= property <= to`.
    pub fn between(
        property: impl Into<String>,
        from: impl Into<CriterionValue>,
        to: impl Into<CriterionValue>,
    ) -> Self {
        Criterion::Between {
            property: property.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    /// Compare two properties.
    pub fn compare(op: ComparisonOp, property: impl Into<String>, other: impl Into<String>) -> Self {
        Criterion::PropertyComparison {
            op,
            property: property.into(),
            other: other.into(),
        }
    }

    /// Conjunction of `criteria`.
    pub fn and(criteria: Vec<Criterion>) -> Self {
        Criterion::Conjunction(criteria)
    }

    /// Disjunction of `criteria`.
    pub fn or(criteria: Vec<Criterion>) -> Self {
        Criterion::Disjunction(criteria)
    }

    /// Negation of `criteria`.
    pub fn not(criteria: Vec<Criterion>) -> Self {
        Criterion::Negation(criteria)
    }

    /// Whether this is a junction with no children.
    pub fn is_empty_junction(&self) -> bool {
        match self {
            Criterion::Conjunction(c) | Criterion::Disjunction(c) | Criterion::Negation(c) => {
                c.is_empty()
            }
            _ => false,
        }
    }

    /// Name of the criterion variant, as used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Criterion::Conjunction(_) => "Conjunction",
            Criterion::Disjunction(_) => "Disjunction",
            Criterion::Negation(_) => "Negation",
            Criterion::Equals { .. } => "Equals",
            Criterion::NotEquals { .. } => "NotEquals",
            Criterion::GreaterThan { .. } => "GreaterThan",
            Criterion::GreaterThanEquals { .. } => "GreaterThanEquals",
            Criterion::LessThan { .. } => "LessThan",
            Criterion::LessThanEquals { .. } => "LessThanEquals",
            Criterion::IsNull { .. } => "IsNull",
            Criterion::IsNotNull { .. } => "IsNotNull",
            Criterion::IsTrue { .. } => "IsTrue",
            Criterion::IsFalse { .. } => "IsFalse",
            Criterion::IdEquals(_) => "IdEquals",
            Criterion::VersionEquals(_) => "VersionEquals",
            Criterion::In { .. } => "In",
            Criterion::NotIn { .. } => "NotIn",
            Criterion::Between { .. } => "Between",
            Criterion::Regex { .. } => "Regex",
            Criterion::IsEmpty { .. } => "IsEmpty",
            Criterion::IsNotEmpty { .. } => "IsNotEmpty",
            Criterion::PropertyComparison { op, .. } => op.criterion_name(),
            Criterion::Like { .. } => "Like",
            Criterion::SizeEquals { .. } => "SizeEquals",
        }
    }
}

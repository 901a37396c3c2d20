use vestige_core::query::CompareOp;
use vestige_core::{Value, VersionKey, VersionRow};

/// A condition over a dotted lookup path.
///
/// A path is a column of the queried entity (`name`), or relationship
/// names followed by a column (`team.city.name`). Each relationship hop is
/// joined at the query's time. A path ending at a relationship compares the
/// identity of the related object.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Compare {
        path: String,
        op: CompareOp,
        value: Value,
    },
    IsNull {
        path: String,
        null: bool,
    },
    In {
        path: String,
        values: Vec<Value>,
    },
    /// Path refers to the object `identity` belongs to, whichever of its
    /// versions was supplied.
    RefersTo {
        path: String,
        identity: VersionKey,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    fn compare(path: impl Into<String>, op: CompareOp, value: impl Into<Value>) -> Self {
        Filter::Compare {
            path: path.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Eq, value)
    }

    pub fn ne(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Ne, value)
    }

    pub fn lt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Lt, value)
    }

    pub fn lte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Lte, value)
    }

    pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Gt, value)
    }

    pub fn gte(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::compare(path, CompareOp::Gte, value)
    }

    pub fn is_null(path: impl Into<String>, null: bool) -> Self {
        Filter::IsNull {
            path: path.into(),
            null,
        }
    }

    pub fn is_in<I, V>(path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In {
            path: path.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Match by the identity of `row`, so a historical version works as
    /// well as the current one.
    pub fn refers_to(path: impl Into<String>, row: &VersionRow) -> Self {
        Filter::RefersTo {
            path: path.into(),
            identity: row.identity(),
        }
    }

    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::And(filters.into_iter().collect())
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Filter::Or(filters.into_iter().collect())
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(filter: Filter) -> Self {
        Filter::Not(Box::new(filter))
    }
}

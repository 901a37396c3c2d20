use crate::models::{QueryTime, Value, ValueKind};

/// A column qualified by a table alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub alias: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(alias: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            column: column.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    True,
    Compare {
        column: ColumnRef,
        op: CompareOp,
        value: Value,
    },
    ColumnEq {
        left: ColumnRef,
        right: ColumnRef,
    },
    IsNull(ColumnRef),
    IsNotNull(ColumnRef),
    In {
        column: ColumnRef,
        values: Vec<Value>,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
    /// Restricts the rows of `alias` to those visible at `time`.
    Temporal {
        alias: String,
        time: QueryTime,
    },
}

impl Predicate {
    pub fn eq(column: ColumnRef, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column,
            op: CompareOp::Eq,
            value: value.into(),
        }
    }

    pub fn compare(column: ColumnRef, op: CompareOp, value: impl Into<Value>) -> Self {
        Predicate::Compare {
            column,
            op,
            value: value.into(),
        }
    }

    pub fn temporal(alias: impl Into<String>, time: QueryTime) -> Self {
        Predicate::Temporal {
            alias: alias.into(),
            time,
        }
    }

    /// Conjunction that drops `True` terms and flattens nested `And`s.
    pub fn all(parts: impl IntoIterator<Item = Predicate>) -> Self {
        let mut terms = Vec::new();
        for part in parts {
            match part {
                Predicate::True => {}
                Predicate::And(inner) => terms.extend(inner),
                other => terms.push(other),
            }
        }
        match terms.len() {
            0 => Predicate::True,
            1 => terms.remove(0),
            _ => Predicate::And(terms),
        }
    }

    pub fn and(self, other: Predicate) -> Self {
        Predicate::all([self, other])
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Predicate::True)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub table: String,
    pub alias: String,
    pub on: Predicate,
}

/// A selected column, the kind used to decode it, and the record key it lands under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectColumn {
    pub column: ColumnRef,
    pub kind: ValueKind,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Columns(Vec<SelectColumn>),
    CountDistinct(ColumnRef),
    CountAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: ColumnRef,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Select {
    pub table: String,
    pub alias: String,
    pub projection: Projection,
    pub joins: Vec<Join>,
    pub filter: Predicate,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub distinct: bool,
}

impl Select {
    pub fn from(table: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            alias: alias.into(),
            projection: Projection::CountAll,
            joins: Vec::new(),
            filter: Predicate::True,
            order_by: Vec::new(),
            limit: None,
            distinct: false,
        }
    }

    pub fn project(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = std::mem::replace(&mut self.filter, Predicate::True).and(predicate);
        self
    }

    pub fn order(mut self, column: ColumnRef, descending: bool) -> Self {
        self.order_by.push(OrderBy { column, descending });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Multi-row insert; every row has one value per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Single-table update. Predicates reference the table by its own name.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub table: String,
    pub assignments: Vec<(String, Value)>,
    pub filter: Predicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    pub table: String,
    pub filter: Predicate,
}

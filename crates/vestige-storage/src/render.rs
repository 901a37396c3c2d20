//! SQL rendering of the statement AST for SQLite.
//!
//! This is the only place the `Temporal` predicate node becomes SQL.

use vestige_core::config::IdentifierMode;
use vestige_core::models::{VALID_FROM_COLUMN, VALID_UNTIL_COLUMN};
use vestige_core::query::{
    ColumnRef, CompareOp, Delete, Insert, JoinKind, Predicate, Projection, Select, Update,
};
use vestige_core::schema::{IndexDef, TableDef};
use vestige_core::{QueryTime, Value, VestigeError, VestigeResult};

use crate::codec::column_type;

/// Rendered SQL with positional parameters in binding order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

pub fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// How column references are written: qualified in selects, bare in
/// single-table updates and deletes.
#[derive(Clone, Copy)]
enum Scope {
    Qualified,
    Bare,
}

struct Renderer {
    sql: String,
    params: Vec<Value>,
    scope: Scope,
}

impl Renderer {
    fn new(scope: Scope) -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
            scope,
        }
    }

    fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }

    fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    fn bind(&mut self, value: Value) {
        self.sql.push('?');
        self.params.push(value);
    }

    fn column(&mut self, column: &ColumnRef) {
        let rendered = self.qualify(&column.alias, &column.column);
        self.sql.push_str(&rendered);
    }

    fn qualify(&self, alias: &str, column: &str) -> String {
        match self.scope {
            Scope::Qualified => format!("{}.{}", quote(alias), quote(column)),
            Scope::Bare => quote(column),
        }
    }

    fn predicate(&mut self, predicate: &Predicate) {
        match predicate {
            Predicate::True => self.push("1 = 1"),
            Predicate::Compare { column, op, value } => match (op, value) {
                (CompareOp::Eq, Value::Null) => {
                    self.column(column);
                    self.push(" IS NULL");
                }
                (CompareOp::Ne, Value::Null) => {
                    self.column(column);
                    self.push(" IS NOT NULL");
                }
                _ => {
                    self.column(column);
                    self.push(" ");
                    self.push(op.symbol());
                    self.push(" ");
                    self.bind(value.clone());
                }
            },
            Predicate::ColumnEq { left, right } => {
                self.column(left);
                self.push(" = ");
                self.column(right);
            }
            Predicate::IsNull(column) => {
                self.column(column);
                self.push(" IS NULL");
            }
            Predicate::IsNotNull(column) => {
                self.column(column);
                self.push(" IS NOT NULL");
            }
            Predicate::In { column, values } => {
                if values.is_empty() {
                    self.push("0 = 1");
                    return;
                }
                self.column(column);
                self.push(" IN (");
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        self.push(", ");
                    }
                    self.bind(value.clone());
                }
                self.push(")");
            }
            Predicate::And(parts) => self.junction(parts, " AND ", "1 = 1"),
            Predicate::Or(parts) => self.junction(parts, " OR ", "0 = 1"),
            Predicate::Not(inner) => {
                self.push("NOT (");
                self.predicate(inner);
                self.push(")");
            }
            Predicate::Temporal { alias, time } => self.temporal(alias, *time),
        }
    }

    fn junction(&mut self, parts: &[Predicate], separator: &str, empty: &str) {
        if parts.is_empty() {
            self.push(empty);
            return;
        }
        self.push("(");
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.push(separator);
            }
            self.predicate(part);
        }
        self.push(")");
    }

    fn temporal(&mut self, alias: &str, time: QueryTime) {
        let from = self.qualify(alias, VALID_FROM_COLUMN);
        let until = self.qualify(alias, VALID_UNTIL_COLUMN);
        match time {
            QueryTime::Unbounded => self.push("1 = 1"),
            QueryTime::Current => {
                self.push(&until);
                self.push(" IS NULL");
            }
            QueryTime::AsOf(t) => {
                self.push("(");
                self.push(&from);
                self.push(" <= ");
                self.bind(Value::Timestamp(t));
                self.push(&format!(" AND ({until} IS NULL OR {until} > "));
                self.bind(Value::Timestamp(t));
                self.push("))");
            }
        }
    }

    fn from_clause(&mut self, select: &Select) {
        self.push(" FROM ");
        self.push(&quote(&select.table));
        self.push(" AS ");
        self.push(&quote(&select.alias));
        for join in &select.joins {
            self.push(match join.kind {
                JoinKind::Inner => " INNER JOIN ",
                JoinKind::Left => " LEFT JOIN ",
            });
            self.push(&quote(&join.table));
            self.push(" AS ");
            self.push(&quote(&join.alias));
            self.push(" ON ");
            self.predicate(&join.on);
        }
        if !select.filter.is_true() {
            self.push(" WHERE ");
            self.predicate(&select.filter);
        }
    }
}

pub fn render_select(select: &Select) -> VestigeResult<Statement> {
    let Projection::Columns(columns) = &select.projection else {
        return Err(VestigeError::InvalidArgument(
            "select needs a column projection".to_string(),
        ));
    };
    if columns.is_empty() {
        return Err(VestigeError::InvalidArgument(
            "select projects no columns".to_string(),
        ));
    }
    let mut r = Renderer::new(Scope::Qualified);
    r.push("SELECT ");
    if select.distinct {
        r.push("DISTINCT ");
    }
    for (i, column) in columns.iter().enumerate() {
        if i > 0 {
            r.push(", ");
        }
        r.column(&column.column);
        r.push(" AS ");
        r.push(&quote(&column.label));
    }
    r.from_clause(select);
    if !select.order_by.is_empty() {
        r.push(" ORDER BY ");
        for (i, order) in select.order_by.iter().enumerate() {
            if i > 0 {
                r.push(", ");
            }
            r.column(&order.column);
            r.push(if order.descending { " DESC" } else { " ASC" });
        }
    }
    if let Some(limit) = select.limit {
        r.push(&format!(" LIMIT {limit}"));
    }
    Ok(r.finish())
}

pub fn render_count(select: &Select) -> VestigeResult<Statement> {
    let mut r = Renderer::new(Scope::Qualified);
    match &select.projection {
        Projection::CountAll => r.push("SELECT COUNT(*)"),
        Projection::CountDistinct(column) => {
            r.push("SELECT COUNT(DISTINCT ");
            r.column(column);
            r.push(")");
        }
        Projection::Columns(_) => {
            return Err(VestigeError::InvalidArgument(
                "count needs a count projection".to_string(),
            ))
        }
    }
    r.from_clause(select);
    Ok(r.finish())
}

pub fn render_insert(insert: &Insert) -> VestigeResult<Statement> {
    if insert.rows.is_empty() {
        return Err(VestigeError::InvalidArgument(format!(
            "insert into {} has no rows",
            insert.table
        )));
    }
    let mut r = Renderer::new(Scope::Bare);
    r.push("INSERT INTO ");
    r.push(&quote(&insert.table));
    r.push(" (");
    let columns: Vec<String> = insert.columns.iter().map(|c| quote(c)).collect();
    r.push(&columns.join(", "));
    r.push(") VALUES ");
    for (i, row) in insert.rows.iter().enumerate() {
        if row.len() != insert.columns.len() {
            return Err(VestigeError::InvalidArgument(format!(
                "insert into {}: row {i} has {} values for {} columns",
                insert.table,
                row.len(),
                insert.columns.len()
            )));
        }
        if i > 0 {
            r.push(", ");
        }
        r.push("(");
        for (j, value) in row.iter().enumerate() {
            if j > 0 {
                r.push(", ");
            }
            r.bind(value.clone());
        }
        r.push(")");
    }
    Ok(r.finish())
}

pub fn render_update(update: &Update) -> VestigeResult<Statement> {
    if update.assignments.is_empty() {
        return Err(VestigeError::InvalidArgument(format!(
            "update of {} assigns nothing",
            update.table
        )));
    }
    let mut r = Renderer::new(Scope::Bare);
    r.push("UPDATE ");
    r.push(&quote(&update.table));
    r.push(" SET ");
    for (i, (column, value)) in update.assignments.iter().enumerate() {
        if i > 0 {
            r.push(", ");
        }
        r.push(&quote(column));
        r.push(" = ");
        r.bind(value.clone());
    }
    if !update.filter.is_true() {
        r.push(" WHERE ");
        r.predicate(&update.filter);
    }
    Ok(r.finish())
}

pub fn render_delete(delete: &Delete) -> Statement {
    let mut r = Renderer::new(Scope::Bare);
    r.push("DELETE FROM ");
    r.push(&quote(&delete.table));
    if !delete.filter.is_true() {
        r.push(" WHERE ");
        r.predicate(&delete.filter);
    }
    r.finish()
}

pub fn render_create_table(table: &TableDef, mode: IdentifierMode) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let mut sql = format!("{} {}", quote(&c.name), column_type(c.kind, mode));
            if !c.nullable {
                sql.push_str(" NOT NULL");
            }
            if c.primary_key {
                sql.push_str(" PRIMARY KEY");
            }
            sql
        })
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote(&table.name),
        columns.join(", ")
    )
}

pub fn render_create_index(index: &IndexDef) -> String {
    let columns: Vec<String> = index.columns.iter().map(|c| quote(c)).collect();
    let mut sql = format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        quote(&index.name),
        quote(&index.table),
        columns.join(", ")
    );
    if index.current_only {
        sql.push_str(&format!(" WHERE {} IS NULL", quote(VALID_UNTIL_COLUMN)));
    }
    sql
}

//! Backend-neutral statement AST. The temporal layer builds these; the
//! storage collaborator renders and executes them.

mod ast;

pub use ast::{
    ColumnRef, CompareOp, Delete, Insert, Join, JoinKind, OrderBy, Predicate, Projection, Select,
    SelectColumn, Update,
};

//! Group CSV rows by key fields and compute one output row per group.

use std::path::PathBuf;

use dw::text::TextErrors;
use dw::{InputSource, OutputTarget};
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::dialect::{Dialect, gather_values};
use crate::error::{CwError, Result};
use crate::formula::{Bindings, Expr, FormulaError, Scope, evaluate, evaluate_bindings, parse, parse_bindings};
use crate::metadata;
use crate::reader::{Row, TypedReader};
use crate::value::Value;
use crate::writer::TypedWriter;

/// Rows sharing a key tuple, in order of first appearance.
pub type Groups = IndexMap<Vec<Value>, Vec<Row>>;

#[derive(Debug, Clone, Default)]
pub struct PivotOptions {
    pub dialect: Dialect,
    pub errors: TextErrors,
    pub metadata: Option<PathBuf>,
    /// CSV texts naming the key fields: `["a,b", "c"]`.
    pub key_fields: Vec<String>,
    /// `NAME=EXPR` assignments.
    pub formulas: Vec<String>,
    /// `NAME = EXPR; ...` bindings evaluated once, before grouping.
    pub before_all: Option<String>,
}

/// Split `NAME=EXPR` at the first `=`.
pub fn parse_assignment(assignment: &str) -> Result<(String, String)> {
    match assignment.split_once('=') {
        Some((name, expr)) if !name.trim().is_empty() => Ok((name.trim().to_string(), expr.trim().to_string())),
        _ => Err(CwError::InvalidAssignment(assignment.to_string())),
    }
}

/// Parse every assignment; a name assigned twice keeps its first position
/// and its last formula.
pub fn compile_formulas<S: AsRef<str>>(assignments: &[S]) -> Result<IndexMap<String, Expr>> {
    let mut formulas = IndexMap::new();
    for assignment in assignments {
        let (name, src) = parse_assignment(assignment.as_ref())?;
        let expr = parse(&src).map_err(|e| CwError::formula(name.as_str(), e))?;
        formulas.insert(name, expr);
    }
    Ok(formulas)
}

fn before_all(statement: Option<&str>) -> Result<Bindings> {
    match statement.map(str::trim) {
        None | Some("") => Ok(Bindings::new()),
        Some(src) => {
            let parsed = parse_bindings(src).map_err(|e| CwError::formula("--before-all", e))?;
            evaluate_bindings(&parsed).map_err(|(name, e)| CwError::formula(name, e))
        }
    }
}

/// Bucket rows by the values of `key_fields`; a field absent from a row keys as `Null`.
pub fn group_rows<I>(rows: I, key_fields: &[String]) -> Result<Groups>
where
    I: IntoIterator<Item = Result<Row>>,
{
    let mut groups = Groups::new();
    for row in rows {
        let row = row?;
        let key: Vec<Value> = key_fields
            .iter()
            .map(|field| row.get(field).cloned().unwrap_or(Value::Null))
            .collect();
        groups.entry(key).or_default().push(row);
    }
    Ok(groups)
}

/// Key fields first, then formula fields, each name once.
pub fn output_fieldnames(key_fields: &[String], formulas: &IndexMap<String, Expr>) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(key_fields.len() + formulas.len());
    for name in key_fields.iter().chain(formulas.keys()) {
        if !names.contains(name) {
            names.push(name.clone());
        }
    }
    names
}

/// Names visible to a formula while one group is evaluated.
struct GroupScope<'a> {
    rows: &'a [Row],
    /// `rows` as a list of records, built once for the group.
    records: Value,
    fieldnames: &'a [String],
    bindings: &'a Bindings,
}

impl<'a> GroupScope<'a> {
    fn new(rows: &'a [Row], fieldnames: &'a [String], bindings: &'a Bindings) -> Self {
        let records = Value::List(rows.iter().cloned().map(Value::Record).collect());
        Self {
            rows,
            records,
            fieldnames,
            bindings,
        }
    }
}

impl Scope for GroupScope<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        if name == "rows" {
            return Some(self.records.clone());
        }
        if let Some(field) = name.strip_prefix('_')
            && self.fieldnames.iter().any(|f| f == field)
        {
            let column = self
                .rows
                .iter()
                .map(|row| row.get(field).cloned().unwrap_or(Value::Null))
                .collect();
            return Some(Value::List(column));
        }
        self.bindings.lookup(name)
    }
}

/// Compute one output row per group.
pub fn evaluate_groups(
    groups: &Groups,
    fieldnames: &[String],
    key_fields: &[String],
    formulas: &IndexMap<String, Expr>,
    bindings: &Bindings,
) -> Result<Vec<Row>> {
    let mut output = Vec::with_capacity(groups.len());
    for (key, rows) in groups {
        let mut out = Row::new();
        for (field, value) in key_fields.iter().zip(key) {
            out.insert(field.clone(), value.clone());
        }
        let scope = GroupScope::new(rows, fieldnames, bindings);
        for (name, expr) in formulas {
            let value = evaluate(expr, &scope).map_err(|e| CwError::formula(name.as_str(), e))?;
            if let Value::List(_) | Value::Record(_) = value {
                return Err(CwError::formula(
                    name.as_str(),
                    FormulaError::type_error(format!(
                        "result is a {}; aggregate it, e.g. sum(...) or first(...)",
                        value.type_name()
                    )),
                ));
            }
            out.insert(name.clone(), value);
        }
        output.push(out);
    }
    Ok(output)
}

/// Pivot `input` into `output`. Returns the number of groups written.
///
/// Without key fields nothing is read or written.
pub fn pivot(input: &InputSource, output: &OutputTarget, opts: &PivotOptions) -> Result<usize> {
    if opts.key_fields.is_empty() {
        info!("Exit pivot because of no key field name");
        return Ok(0);
    }
    let dialect = &opts.dialect;
    let key_fields = gather_values(&opts.key_fields, dialect.input_delimiter, dialect.input_quotechar)?;
    let formulas = compile_formulas(&opts.formulas)?;
    let bindings = before_all(opts.before_all.as_deref())?;
    let types = metadata::load(opts.metadata.as_deref())?.field_types()?;
    debug!("Found key_fields=={:?}, formulas=={:?}", key_fields, formulas.keys());

    let (fieldnames, groups) = {
        let reader = TypedReader::open(input, dialect, types.clone(), opts.errors)?;
        let fieldnames = reader.fieldnames().to_vec();
        (fieldnames, group_rows(reader, &key_fields)?)
    };
    info!("Found {} groups in input_file=='{}'", groups.len(), input);

    let rows = evaluate_groups(&groups, &fieldnames, &key_fields, &formulas, &bindings)?;
    let output_fieldnames = output_fieldnames(&key_fields, &formulas);
    debug!("Found output_fieldnames=={:?}", output_fieldnames);

    let mut writer = TypedWriter::open(output, dialect, output_fieldnames, types)?;
    writer.write_header()?;
    for row in &rows {
        writer.write_row(row)?;
    }
    writer.finish()
}

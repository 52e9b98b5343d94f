//! Python bindings for the ORCA input parser.
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

fn load() -> PyResult<&'static tree_sitter_orca::Language> {
    tree_sitter_orca::language()
        .map_err(|e| PyValueError::new_err(format!("Error loading Orca grammar: {e}")))
}

/// Parse ORCA input and return the syntax tree as an S-expression.
#[pyfunction]
fn parse(source: &str) -> PyResult<String> {
    let mut parser = tree_sitter_orca::Parser::new();
    parser
        .set_language(load()?)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    parser
        .parse(source)
        .map(|tree| tree.to_sexp())
        .ok_or_else(|| PyValueError::new_err("Error loading Orca grammar"))
}

/// The visible node kinds of the ORCA grammar.
#[pyfunction]
fn node_kinds() -> PyResult<Vec<String>> {
    Ok(load()?
        .node_types()
        .into_iter()
        .map(|node_type| node_type.kind)
        .collect())
}

/// The grammar's name.
#[pyfunction]
fn language_name() -> PyResult<String> {
    Ok(load()?.name().to_owned())
}

#[pymodule]
fn _orca(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(parse, m)?)?;
    m.add_function(wrap_pyfunction!(node_kinds, m)?)?;
    m.add_function(wrap_pyfunction!(language_name, m)?)?;
    Ok(())
}

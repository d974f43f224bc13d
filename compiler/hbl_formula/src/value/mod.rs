//! Runtime values.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::EvalError;


/// Dictionaries keep their keys sorted, which also fixes the order in which
/// redirected input lines are consumed.
pub type Dict = BTreeMap<String, Value>;

/// A value produced by a formula.
///
/// Matrices and dictionaries are shared; writes go through
/// [`Rc::make_mut`] so a copy is made only while another owner exists.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    Number(f64),
    Str(Rc<str>),
    Matrix(Rc<Matrix>),
    Dict(Rc<Dict>),
    #[default]
    Undefined,
}

impl Value {
    pub fn string(s: impl Into<Rc<str>>) -> Self {
        Value::Str(s.into())
    }

    pub fn matrix(matrix: Matrix) -> Self {
        Value::Matrix(Rc::new(matrix))
    }

    pub fn dict(dict: Dict) -> Self {
        Value::Dict(Rc::new(dict))
    }

    pub fn bool(flag: bool) -> Self {
        Value::Number(if flag { 1.0 } else { 0.0 })
    }

    /// Name reported by `Type(x)`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Str(_) => "String",
            Value::Matrix(_) => "Matrix",
            Value::Dict(_) => "AssociativeList",
            Value::Undefined => "Unknown",
        }
    }

    #[inline]
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Numeric view; an undefined value reads as zero.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Undefined => Some(0.0),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Branch truthiness: non-zero number, non-empty string.
    ///
    /// `Undefined` is false; any other kind cannot drive a branch.
    pub fn truthiness(&self) -> Result<bool, EvalError> {
        match self {
            Value::Number(n) => Ok(*n != 0.0),
            Value::Str(s) => Ok(!s.is_empty()),
            Value::Undefined => Ok(false),
            other => Err(EvalError::NotACondition(other.type_name())),
        }
    }

    /// Text used by string concatenation and `fprintf`.
    pub fn to_text(&self) -> String {
        match self {
            Value::Str(s) => s.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

/// Integral values print without a fraction.
pub(crate) fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => f.write_str(&format_number(*n)),
            Value::Str(s) => f.write_str(s),
            Value::Matrix(m) => write!(f, "{m}"),
            Value::Dict(d) => {
                f.write_str("{")?;
                for (i, (key, value)) in d.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    match value {
                        Value::Str(s) => write!(f, "\"{key}\":\"{s}\"")?,
                        other => write!(f, "\"{key}\":{other}")?,
                    }
                }
                f.write_str("}")
            }
            Value::Undefined => Ok(()),
        }
    }
}

/// Dense numeric matrix, row-major.
#[derive(Clone, Debug, PartialEq)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    cells: Vec<f64>,
}

impl Matrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Matrix {
            rows,
            cols,
            cells: vec![0.0; rows * cols],
        }
    }

    /// Build from rows; every row must have the same length.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Option<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if rows.iter().any(|row| row.len() != cols) {
            return None;
        }
        Some(Matrix {
            rows: rows.len(),
            cols,
            cells: rows.into_iter().flatten().collect(),
        })
    }

    pub(crate) fn from_cells(rows: usize, cols: usize, cells: Vec<f64>) -> Self {
        Matrix { rows, cols, cells }
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn cells(&self) -> &[f64] {
        &self.cells
    }

    fn offset(&self, row: usize, col: usize) -> Result<usize, EvalError> {
        if row >= self.rows || col >= self.cols {
            return Err(EvalError::IndexOutOfRange {
                index: format!("[{row}][{col}]"),
                shape: format!("{}x{}", self.rows, self.cols),
            });
        }
        Ok(row * self.cols + col)
    }

    /// Vectors accept a single index; anything else needs row and column.
    fn linear(&self, index: usize) -> Result<usize, EvalError> {
        if index >= self.cells.len() {
            return Err(EvalError::IndexOutOfRange {
                index: format!("[{index}]"),
                shape: format!("{}x{}", self.rows, self.cols),
            });
        }
        Ok(index)
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64, EvalError> {
        self.offset(row, col).map(|at| self.cells[at])
    }

    pub fn get_linear(&self, index: usize) -> Result<f64, EvalError> {
        self.linear(index).map(|at| self.cells[at])
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<(), EvalError> {
        let at = self.offset(row, col)?;
        self.cells[at] = value;
        Ok(())
    }

    pub fn set_linear(&mut self, index: usize, value: f64) -> Result<(), EvalError> {
        let at = self.linear(index)?;
        self.cells[at] = value;
        Ok(())
    }

    pub(crate) fn map(&self, f: impl Fn(f64) -> f64) -> Matrix {
        Matrix::from_cells(self.rows, self.cols, self.cells.iter().map(|&x| f(x)).collect())
    }

    pub(crate) fn zip(&self, other: &Matrix, f: impl Fn(f64, f64) -> f64) -> Option<Matrix> {
        if self.rows != other.rows || self.cols != other.cols {
            return None;
        }
        let cells = self
            .cells
            .iter()
            .zip(&other.cells)
            .map(|(&a, &b)| f(a, b))
            .collect();
        Some(Matrix::from_cells(self.rows, self.cols, cells))
    }

    pub(crate) fn product(&self, other: &Matrix) -> Option<Matrix> {
        if self.cols != other.rows {
            return None;
        }
        let mut out = Matrix::zeros(self.rows, other.cols);
        for r in 0..self.rows {
            for c in 0..other.cols {
                out.cells[r * other.cols + c] = (0..self.cols)
                    .map(|k| self.cells[r * self.cols + k] * other.cells[k * other.cols + c])
                    .sum();
            }
        }
        Some(out)
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for r in 0..self.rows {
            f.write_str("\n{")?;
            for c in 0..self.cols {
                if c > 0 {
                    f.write_str(", ")?;
                }
                f.write_str(&format_number(self.cells[r * self.cols + c]))?;
            }
            f.write_str("}")?;
        }
        if self.rows > 0 {
            f.write_str("\n")?;
        }
        f.write_str("}")
    }
}

use thiserror::Error;

/// Represents a linear programming problem in bounded, sparse-row form:
///
/// ```text
/// minimize   c^T x
/// subject to rows[r].lower <= A[r] x <= rows[r].upper
///            columns[k].lower <= x[k] <= columns[k].upper
/// ```
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct LpProblem {
    /// Objective function coefficients (costs)
    pub objective: Objective,
    /// Bounds for each variable
    pub columns: Vec<Bounds>,
    /// Bounds for each constraint row
    pub rows: Vec<Bounds>,
    /// Constraint coefficients, one sparse row per entry of `rows`
    pub matrix: SparseMatrix,
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Objective {
    /// Coefficients for each variable
    pub coefficients: Vec<f64>,
    /// Whether to minimize or maximize
    pub minimize: bool,
}

/// Closed interval `[lower, upper]`; either side may be infinite.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub lower: f64,
    pub upper: f64,
}

impl Bounds {
    pub fn between(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn fixed(value: f64) -> Self {
        Self::between(value, value)
    }

    /// `[0, upper]`
    pub fn at_most(upper: f64) -> Self {
        Self::between(0.0, upper)
    }

    /// `[0, +inf)`
    pub fn non_negative() -> Self {
        Self::between(0.0, f64::INFINITY)
    }

    pub fn free() -> Self {
        Self::between(f64::NEG_INFINITY, f64::INFINITY)
    }

    pub fn is_fixed(&self) -> bool {
        self.lower == self.upper
    }

    fn has_nan(&self) -> bool {
        self.lower.is_nan() || self.upper.is_nan()
    }
}

/// Compressed sparse row storage.
///
/// Row `r` owns the entries `row_starts[r]..row_starts[r + 1]` of `columns`
/// and `values`. The final offset always equals the number of non-zeros.
/// Deserialized matrices go through [`SparseMatrix::from_parts`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "CsrParts"))]
#[derive(Debug, Clone, PartialEq)]
pub struct SparseMatrix {
    row_starts: Vec<usize>,
    columns: Vec<usize>,
    values: Vec<f64>,
}

#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct CsrParts {
    row_starts: Vec<usize>,
    columns: Vec<usize>,
    values: Vec<f64>,
}

#[cfg(feature = "serde")]
impl TryFrom<CsrParts> for SparseMatrix {
    type Error = ProblemError;

    fn try_from(parts: CsrParts) -> Result<Self, Self::Error> {
        Self::from_parts(parts.row_starts, parts.columns, parts.values)
    }
}

impl Default for SparseMatrix {
    fn default() -> Self {
        Self {
            row_starts: vec![0],
            columns: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl SparseMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(rows: usize, nonzeros: usize) -> Self {
        let mut row_starts = Vec::with_capacity(rows + 1);
        row_starts.push(0);
        Self {
            row_starts,
            columns: Vec::with_capacity(nonzeros),
            values: Vec::with_capacity(nonzeros),
        }
    }

    /// Assemble a matrix from raw CSR triples, checking the offset invariants.
    pub fn from_parts(
        row_starts: Vec<usize>,
        columns: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self, ProblemError> {
        let matrix = Self { row_starts, columns, values };
        matrix.check_layout()?;
        Ok(matrix)
    }

    fn check_layout(&self) -> Result<(), ProblemError> {
        if self.columns.len() != self.values.len() {
            return Err(ProblemError::MisalignedEntries {
                columns: self.columns.len(),
                values: self.values.len(),
            });
        }
        if self.row_starts.first() != Some(&0) {
            return Err(ProblemError::BadRowOffsets("first offset must be 0".to_string()));
        }
        if let Some(r) = self.row_starts.windows(2).position(|w| w[0] > w[1]) {
            return Err(ProblemError::BadRowOffsets(format!("offsets decrease at row {}", r)));
        }
        if self.row_starts.last() != Some(&self.columns.len()) {
            return Err(ProblemError::BadRowOffsets(format!(
                "last offset must equal the non-zero count {}",
                self.columns.len()
            )));
        }
        Ok(())
    }

    /// Append one row; returns its index.
    pub fn push_row(&mut self, entries: impl IntoIterator<Item = (usize, f64)>) -> usize {
        for (column, value) in entries {
            self.columns.push(column);
            self.values.push(value);
        }
        self.row_starts.push(self.columns.len());
        self.row_starts.len() - 2
    }

    pub fn num_rows(&self) -> usize {
        self.row_starts.len().saturating_sub(1)
    }

    pub fn num_nonzeros(&self) -> usize {
        self.columns.len()
    }

    pub fn row_len(&self, row: usize) -> usize {
        self.row_starts[row + 1] - self.row_starts[row]
    }

    pub fn row(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let span = self.row_starts[row]..self.row_starts[row + 1];
        self.columns[span.clone()]
            .iter()
            .copied()
            .zip(self.values[span].iter().copied())
    }

    pub fn row_starts(&self) -> &[usize] {
        &self.row_starts
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProblemError {
    #[error("Objective has {coefficients} coefficients but the problem has {columns} columns")]
    ObjectiveLength { coefficients: usize, columns: usize },
    #[error("Matrix has {matrix} rows but {bounds} row bounds were given")]
    RowCount { matrix: usize, bounds: usize },
    #[error("Column index {column} in row {row} is out of range for {columns} columns")]
    ColumnOutOfRange { row: usize, column: usize, columns: usize },
    #[error("Column index and value sequences differ in length ({columns} vs {values})")]
    MisalignedEntries { columns: usize, values: usize },
    #[error("Invalid row offsets: {0}")]
    BadRowOffsets(String),
    #[error("NaN found in {0}")]
    NotANumber(String),
}

impl LpProblem {
    pub fn new(objective: Objective, columns: Vec<Bounds>, rows: Vec<Bounds>, matrix: SparseMatrix) -> Self {
        Self {
            objective,
            columns,
            rows,
            matrix,
        }
    }

    pub fn num_variables(&self) -> usize {
        self.columns.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.rows.len()
    }

    /// Check the shape invariants engines rely on.
    pub fn validate(&self) -> Result<(), ProblemError> {
        let n = self.num_variables();
        self.matrix.check_layout()?;
        if self.objective.coefficients.len() != n {
            return Err(ProblemError::ObjectiveLength {
                coefficients: self.objective.coefficients.len(),
                columns: n,
            });
        }
        if self.matrix.num_rows() != self.rows.len() {
            return Err(ProblemError::RowCount {
                matrix: self.matrix.num_rows(),
                bounds: self.rows.len(),
            });
        }
        if let Some(k) = self.objective.coefficients.iter().position(|c| c.is_nan()) {
            return Err(ProblemError::NotANumber(format!("objective coefficient {}", k)));
        }
        if let Some(k) = self.columns.iter().position(Bounds::has_nan) {
            return Err(ProblemError::NotANumber(format!("column bound {}", k)));
        }
        if let Some(r) = self.rows.iter().position(Bounds::has_nan) {
            return Err(ProblemError::NotANumber(format!("row bound {}", r)));
        }
        for row in 0..self.matrix.num_rows() {
            for (column, value) in self.matrix.row(row) {
                if column >= n {
                    return Err(ProblemError::ColumnOutOfRange { row, column, columns: n });
                }
                if value.is_nan() {
                    return Err(ProblemError::NotANumber(format!("row {} column {}", row, column)));
                }
            }
        }
        Ok(())
    }
}

//! Table sizing configuration.

use serde::{Deserialize, Serialize};

/// Initial capacities used when a table is created.
///
/// Both values are hints: the column list and the row storage grow past them
/// on demand.
///
/// # Example
///
/// ```
/// use tagtable::TableConfig;
///
/// let config = TableConfig::default().with_record_capacity(100);
/// assert_eq!(config.column_capacity, 10);
/// assert_eq!(config.record_capacity, 100);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    /// Number of columns reserved up front.
    pub column_capacity: usize,
    /// Number of row slots reserved up front.
    pub record_capacity: usize,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            column_capacity: 10,
            record_capacity: 5000,
        }
    }
}

impl TableConfig {
    /// Sets the number of columns reserved up front.
    #[must_use]
    pub fn with_column_capacity(mut self, column_capacity: usize) -> Self {
        self.column_capacity = column_capacity;
        self
    }

    /// Sets the number of row slots reserved up front.
    #[must_use]
    pub fn with_record_capacity(mut self, record_capacity: usize) -> Self {
        self.record_capacity = record_capacity;
        self
    }

    /// Small capacities, so that tests exercise the growth paths.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            column_capacity: 2,
            record_capacity: 2,
        }
    }
}

//! Combination Generator
//!
//! Builds the ordered list of argument combinations for a sweep from two
//! kinds of parameter declarations:
//!
//! - **product parameters** ([`ParameterSpec`]): candidate values combine
//!   via full Cartesian product, last-declared parameter varying fastest;
//! - **zip groups** ([`ZipGroup`]): parameters whose value sequences are
//!   iterated in lockstep (index 0 of every member, then index 1, ...).
//!
//! Zip groups cross with each other and with the product expansion. On key
//! collision the zip value wins over the product value, and a later zip
//! group wins over an earlier one. This merge precedence is a public
//! contract relied on by result columns.
//!
//! # Example
//!
//! ```rust
//! use autodse::grid::{ParameterSpec, SweepGrid};
//! use serde_json::json;
//!
//! let spec = ParameterSpec::new()
//!     .param("a", [json!(1), json!(2)])?
//!     .param("d", [json!("x"), json!("y")])?;
//! let grid = SweepGrid::product_only(spec);
//!
//! let combos = grid.combinations();
//! assert_eq!(combos.len(), 4);
//! assert_eq!(combos[0]["a"], json!(1));
//! assert_eq!(combos[1]["d"], json!("y"));
//! # Ok::<(), autodse::Error>(())
//! ```

use serde_json::Value;

use crate::{Error, Result};

/// One concrete assignment of a value to every swept parameter.
pub type ArgumentCombination = serde_json::Map<String, Value>;

/// Ordered product parameters: name -> non-empty candidate values.
///
/// Declaration order is preserved and determines both nesting order of the
/// Cartesian product and key order inside each combination.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterSpec {
    entries: Vec<(String, Vec<Value>)>,
}

impl ParameterSpec {
    /// Create an empty spec.
    ///
    /// An empty spec expands to exactly one empty combination, so a sweep
    /// built from zip groups alone still runs once per zip row.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter with its candidate values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyValueSet`] if `values` is empty.
    pub fn param(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<Self> {
        let name = name.into();
        let values: Vec<Value> = values.into_iter().collect();
        if values.is_empty() {
            return Err(Error::EmptyValueSet(name));
        }
        self.entries.push((name, values));
        Ok(self)
    }

    /// Number of declared parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no parameters are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Product of all candidate-sequence lengths (1 for an empty spec).
    #[must_use]
    pub fn combination_count(&self) -> usize {
        self.entries.iter().map(|(_, v)| v.len()).product()
    }

    /// Declared parameter names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Full Cartesian expansion, last parameter varying fastest.
    fn expand(&self) -> Vec<ArgumentCombination> {
        let mut out = vec![ArgumentCombination::new()];
        for (name, values) in &self.entries {
            let mut next = Vec::with_capacity(out.len() * values.len());
            for partial in &out {
                for value in values {
                    let mut combo = partial.clone();
                    combo.insert(name.clone(), value.clone());
                    next.push(combo);
                }
            }
            out = next;
        }
        out
    }
}

/// Parameters whose value sequences vary together element-wise.
///
/// All sequences in one group must have the same length; the group yields
/// one merged map per index position instead of a cross product.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ZipGroup {
    entries: Vec<(String, Vec<Value>)>,
}

impl ZipGroup {
    /// Create an empty group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parameter to the group.
    ///
    /// The first parameter fixes the group length; later parameters must
    /// match it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EmptyValueSet`] for an empty sequence and
    /// [`Error::MismatchedZipLength`] when the length disagrees with the
    /// group.
    pub fn param(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = Value>,
    ) -> Result<Self> {
        let name = name.into();
        let values: Vec<Value> = values.into_iter().collect();
        if values.is_empty() {
            return Err(Error::EmptyValueSet(name));
        }
        if let Some((_, first)) = self.entries.first() {
            if values.len() != first.len() {
                return Err(Error::MismatchedZipLength {
                    param: name,
                    expected: first.len(),
                    actual: values.len(),
                });
            }
        }
        self.entries.push((name, values));
        Ok(self)
    }

    /// Number of index positions the group yields (0 for an empty group).
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.first().map_or(0, |(_, v)| v.len())
    }

    /// True when the group has no parameters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// One merged map per index position.
    fn rows(&self) -> Vec<ArgumentCombination> {
        (0..self.len())
            .map(|i| {
                self.entries
                    .iter()
                    .map(|(name, values)| (name.clone(), values[i].clone()))
                    .collect()
            })
            .collect()
    }
}

/// Product parameters plus zero or more zip groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepGrid {
    spec: ParameterSpec,
    zips: Vec<ZipGroup>,
}

impl SweepGrid {
    /// Build a grid from product parameters and zip groups.
    #[must_use]
    pub fn new(spec: ParameterSpec, zips: Vec<ZipGroup>) -> Self {
        Self { spec, zips }
    }

    /// Build a grid with product parameters only.
    #[must_use]
    pub fn product_only(spec: ParameterSpec) -> Self {
        Self { spec, zips: Vec::new() }
    }

    /// Total combinations the grid will produce.
    #[must_use]
    pub fn combination_count(&self) -> usize {
        self.spec.combination_count()
            * self
                .zips
                .iter()
                .filter(|g| !g.is_empty())
                .map(ZipGroup::len)
                .product::<usize>()
    }

    /// Enumerate every argument combination, in deterministic order.
    ///
    /// Order: product expansion outermost (last product parameter varying
    /// fastest), then the cross over zip groups. Identical inputs always
    /// produce identical ordered output.
    #[must_use]
    pub fn combinations(&self) -> Vec<ArgumentCombination> {
        let product = self.spec.expand();
        let zipped = self.cross_zip_groups();

        let mut out = Vec::with_capacity(product.len() * zipped.len());
        for base in &product {
            for zip_row in &zipped {
                let mut combo = base.clone();
                // zip wins on key collision
                for (key, value) in zip_row {
                    combo.insert(key.clone(), value.clone());
                }
                out.push(combo);
            }
        }
        out
    }

    /// Cartesian product over zip groups, one row per group per element,
    /// merged left to right so a later group wins on collision.
    fn cross_zip_groups(&self) -> Vec<ArgumentCombination> {
        let mut out = vec![ArgumentCombination::new()];
        for group in self.zips.iter().filter(|g| !g.is_empty()) {
            let rows = group.rows();
            let mut next = Vec::with_capacity(out.len() * rows.len());
            for partial in &out {
                for row in &rows {
                    let mut merged = partial.clone();
                    for (key, value) in row {
                        merged.insert(key.clone(), value.clone());
                    }
                    next.push(merged);
                }
            }
            out = next;
        }
        out
    }
}

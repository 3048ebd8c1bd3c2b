//! Categorical to integer code encoding

use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::table::{ColumnData, Table};

/// Display text for the code given to missing categories. Gaps are tracked
/// apart from real values, so a literal `"<missing>"` gets its own code.
pub const MISSING_TOKEN: &str = "<missing>";

/// Bijection between the observed values of one column and codes `0..k`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnEncoding {
    values: Vec<String>,
    codes: HashMap<String, usize>,
    missing: Option<usize>,
}

impl ColumnEncoding {
    /// Code for `value`, assigning the next free one on first sight
    fn code_or_insert(&mut self, value: Option<String>) -> usize {
        let known = match &value {
            Some(text) => self.codes.get(text).copied(),
            None => self.missing,
        };
        if let Some(code) = known {
            return code;
        }
        let code = self.values.len();
        match value {
            Some(text) => {
                self.codes.insert(text.clone(), code);
                self.values.push(text);
            }
            None => {
                self.missing = Some(code);
                self.values.push(MISSING_TOKEN.to_string());
            }
        }
        code
    }

    /// Code of an observed value; gaps are looked up with [`Self::missing_code`]
    pub fn code_of(&self, value: &str) -> Option<usize> {
        self.codes.get(value).copied()
    }

    /// Code given to missing entries, if the column had any
    pub fn missing_code(&self) -> Option<usize> {
        self.missing
    }

    pub fn value_of(&self, code: usize) -> Option<&str> {
        self.values.get(code).map(String::as_str)
    }

    /// Observed values ordered by code, with [`MISSING_TOKEN`] at the gap code
    pub fn values(&self) -> &[String] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Encodings of every encoded column, keyed by column name.
///
/// Derived fresh on each call: codes are only stable for a fixed row order,
/// so callers that need the same codes at inference time keep this map.
pub type EncodingMap = BTreeMap<String, ColumnEncoding>;

/// Replace the listed columns by integer codes in first-seen order
///
/// Every value is read as text first: booleans as `true`/`false`, numbers in
/// their shortest decimal form. Gaps share one code of their own. The
/// encoded columns become numeric.
pub fn encode<S: AsRef<str>>(table: &Table, categorical: &[S]) -> crate::Result<(Table, EncodingMap)> {
    let positions = categorical
        .iter()
        .map(|name| table.position(name.as_ref()))
        .collect::<crate::Result<Vec<_>>>()?;

    let mut output = table.clone();
    let mut encodings = EncodingMap::new();

    for (name, position) in categorical.iter().zip(positions) {
        let data = table.columns()[position].data();
        let mut encoding = ColumnEncoding::default();
        let codes = (0..data.len())
            .map(|row| Some(encoding.code_or_insert(data.text_at(row)) as f64))
            .collect();

        debug!(
            "encoded '{}' into {} categories",
            name.as_ref(),
            encoding.len()
        );
        output.replace_data(position, ColumnData::Numeric(codes));
        encodings.insert(name.as_ref().to_string(), encoding);
    }

    Ok((output, encodings))
}

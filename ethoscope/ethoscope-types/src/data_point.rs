use serde::{Deserialize, Serialize};

use crate::{FunctionalType, Roi, SqlType, Variable, VariableKind};

/// Column identity for result writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnSpec {
    pub header: &'static str,
    pub functional_type: FunctionalType,
    pub sql_type: SqlType,
}

impl From<VariableKind> for ColumnSpec {
    fn from(kind: VariableKind) -> Self {
        Self {
            header: kind.header_name(),
            functional_type: kind.functional_type(),
            sql_type: kind.sql_type(),
        }
    }
}

/// Measurements for one object in one frame.
///
/// Variables keep their insertion order. Setting a kind that is already
/// present replaces it in place, so the column order stays fixed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPoint {
    variables: Vec<Variable>,
}

impl DataPoint {
    pub fn new<I: IntoIterator<Item = Variable>>(variables: I) -> Self {
        let mut out = Self::default();
        for v in variables {
            out.set(v);
        }
        out
    }

    pub fn set(&mut self, variable: Variable) {
        match self.variables.iter_mut().find(|v| v.kind == variable.kind) {
            Some(slot) => *slot = variable,
            None => self.variables.push(variable),
        }
    }

    pub fn get(&self, kind: VariableKind) -> Option<i32> {
        self.variables
            .iter()
            .find(|v| v.kind == kind)
            .map(|v| v.value)
    }

    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn schema(&self) -> Vec<ColumnSpec> {
        self.variables.iter().map(|v| ColumnSpec::from(v.kind)).collect()
    }

    pub fn to_absolute(&self, roi: &Roi) -> Self {
        Self {
            variables: self.variables.iter().map(|v| v.to_absolute(roi)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_replaces_in_place() {
        let mut dp = DataPoint::new([
            Variable::new(VariableKind::X, 1),
            Variable::new(VariableKind::Y, 2),
        ]);
        dp.set(Variable::boolean(VariableKind::IsInferred, false));
        dp.set(Variable::new(VariableKind::X, 10));
        let headers: Vec<_> = dp.schema().iter().map(|c| c.header).collect();
        assert_eq!(headers, ["x", "y", "is_inferred"]);
        assert_eq!(dp.get(VariableKind::X), Some(10));
        assert_eq!(dp.get(VariableKind::Phi), None);
    }
}

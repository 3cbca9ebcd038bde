use serde::{Deserialize, Serialize};

use crate::Roi;

/// What a variable measures, independent of how it is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionalType {
    Distance,
    Angle,
    Bool,
    Label,
    Interaction,
    #[serde(rename = "relative_distance_1e6")]
    RelativeDistance1e6,
    Confidence,
}

impl FunctionalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Distance => "distance",
            Self::Angle => "angle",
            Self::Bool => "bool",
            Self::Label => "label",
            Self::Interaction => "interaction",
            Self::RelativeDistance1e6 => "relative_distance_1e6",
            Self::Confidence => "confidence",
        }
    }
}

/// Column type used by the result writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SqlType {
    #[serde(rename = "SMALLINT")]
    SmallInt,
    #[serde(rename = "BOOLEAN")]
    Boolean,
}

impl SqlType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SmallInt => "SMALLINT",
            Self::Boolean => "BOOLEAN",
        }
    }
}

/// The closed set of variables a tracker or stimulator can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    /// Centre x, relative to the ROI rectangle.
    X,
    /// Centre y, relative to the ROI rectangle.
    Y,
    Width,
    Height,
    /// Orientation in degrees, `[0, 180)`.
    Phi,
    /// `round(log10(displacement) * 1000)`, displacement in ROI widths.
    XyDistance,
    IsInferred,
    HasInteracted,
    /// Candidate-to-model distance on ambiguous frames, times 1000.
    MLogLikelihood,
    Label,
}

impl VariableKind {
    pub fn header_name(&self) -> &'static str {
        match self {
            Self::X => "x",
            Self::Y => "y",
            Self::Width => "w",
            Self::Height => "h",
            Self::Phi => "phi",
            Self::XyDistance => "xy_dist_log10x1000",
            Self::IsInferred => "is_inferred",
            Self::HasInteracted => "has_interacted",
            Self::MLogLikelihood => "m_log_lik",
            Self::Label => "label",
        }
    }

    pub fn functional_type(&self) -> FunctionalType {
        match self {
            Self::X | Self::Y | Self::Width | Self::Height => FunctionalType::Distance,
            Self::Phi => FunctionalType::Angle,
            Self::XyDistance => FunctionalType::RelativeDistance1e6,
            Self::IsInferred => FunctionalType::Bool,
            Self::HasInteracted => FunctionalType::Interaction,
            Self::MLogLikelihood => FunctionalType::Confidence,
            Self::Label => FunctionalType::Label,
        }
    }

    pub fn sql_type(&self) -> SqlType {
        match self {
            Self::IsInferred => SqlType::Boolean,
            _ => SqlType::SmallInt,
        }
    }

    /// Whether the value is expressed in ROI-local coordinates.
    pub fn is_relative(&self) -> bool {
        matches!(self, Self::X | Self::Y)
    }
}

/// A typed scalar measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub kind: VariableKind,
    pub value: i32,
}

impl Variable {
    pub fn new(kind: VariableKind, value: i32) -> Self {
        Self { kind, value }
    }

    pub fn boolean(kind: VariableKind, value: bool) -> Self {
        Self::new(kind, value as i32)
    }

    pub fn header_name(&self) -> &'static str {
        self.kind.header_name()
    }

    /// Convert a relative coordinate to frame coordinates.
    pub fn to_absolute(&self, roi: &Roi) -> Self {
        let (ox, oy) = roi.offset();
        match self.kind {
            VariableKind::X => Self::new(self.kind, self.value + ox),
            VariableKind::Y => Self::new(self.kind, self.value + oy),
            _ => *self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_coordinates_are_shifted() {
        let roi = Roi::new(vec![(100, 50), (150, 50), (150, 90), (100, 90)], 1, None).unwrap();
        let x = Variable::new(VariableKind::X, 3);
        let y = Variable::new(VariableKind::Y, 4);
        let w = Variable::new(VariableKind::Width, 5);
        assert_eq!(x.to_absolute(&roi).value, 103);
        assert_eq!(y.to_absolute(&roi).value, 54);
        assert_eq!(w.to_absolute(&roi).value, 5);
    }

    #[test]
    fn storage_types() {
        assert_eq!(VariableKind::IsInferred.sql_type(), SqlType::Boolean);
        assert_eq!(VariableKind::Phi.sql_type(), SqlType::SmallInt);
        assert_eq!(
            VariableKind::XyDistance.functional_type().as_str(),
            "relative_distance_1e6"
        );
    }
}

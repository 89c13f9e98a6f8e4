use super::ids::AtomId;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BondOrder {
    #[default]
    Single,
    Double,
    Triple,
    Aromatic,
}

impl BondOrder {
    /// Whether sticks and lines draw the bond as a multiple bond.
    pub fn is_multiple(self) -> bool {
        self != BondOrder::Single
    }

    /// How many times a PDB `CONECT` record repeats the partner.
    pub fn multiplicity(self) -> usize {
        match self {
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
            BondOrder::Single | BondOrder::Aromatic => 1,
        }
    }

    /// Inverse of [`BondOrder::multiplicity`]; counts above three clamp to triple.
    pub fn from_multiplicity(count: usize) -> Self {
        match count {
            0 | 1 => BondOrder::Single,
            2 => BondOrder::Double,
            _ => BondOrder::Triple,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unrecognised bond type '{0}'")]
pub struct ParseBondOrderError(pub String);

/// Accepts SDF bond-block numbers (`1`..`4`) and MOL2 bond types. MOL2 amide
/// bonds (`am`) are single bonds; dummy and unknown types are rejected.
impl FromStr for BondOrder {
    type Err = ParseBondOrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "am" => Ok(Self::Single),
            "2" => Ok(Self::Double),
            "3" => Ok(Self::Triple),
            "4" | "ar" => Ok(Self::Aromatic),
            _ => Err(ParseBondOrderError(s.to_string())),
        }
    }
}

/// Writes the MOL2 bond type.
impl fmt::Display for BondOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Single => "1",
            Self::Double => "2",
            Self::Triple => "3",
            Self::Aromatic => "ar",
        })
    }
}

/// A stored bond between two live atoms of the same model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Bond {
    pub atom1_id: AtomId,
    pub atom2_id: AtomId,
    pub order: BondOrder,
    /// Rendered as a multiple bond.
    pub multiple: bool,
}

impl Bond {
    pub fn new(atom1_id: AtomId, atom2_id: AtomId, order: BondOrder) -> Self {
        Self {
            atom1_id,
            atom2_id,
            order,
            multiple: order.is_multiple(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sdf_and_mol2_codes() {
        assert_eq!("1".parse(), Ok(BondOrder::Single));
        assert_eq!("am".parse(), Ok(BondOrder::Single));
        assert_eq!(" 2 ".parse(), Ok(BondOrder::Double));
        assert_eq!("3".parse(), Ok(BondOrder::Triple));
        assert_eq!("AR".parse(), Ok(BondOrder::Aromatic));
        assert_eq!("4".parse(), Ok(BondOrder::Aromatic));
    }

    #[test]
    fn rejects_dummy_and_unknown_types() {
        for code in ["du", "un", "nc", "0", ""] {
            assert!(code.parse::<BondOrder>().is_err(), "{code:?} should not parse");
        }
    }

    #[test]
    fn display_round_trips_through_parse() {
        for order in [
            BondOrder::Single,
            BondOrder::Double,
            BondOrder::Triple,
            BondOrder::Aromatic,
        ] {
            assert_eq!(order.to_string().parse(), Ok(order));
        }
    }

    #[test]
    fn conect_multiplicity_round_trips_except_aromatic() {
        assert_eq!(BondOrder::from_multiplicity(BondOrder::Double.multiplicity()), BondOrder::Double);
        assert_eq!(BondOrder::from_multiplicity(BondOrder::Triple.multiplicity()), BondOrder::Triple);
        assert_eq!(BondOrder::from_multiplicity(BondOrder::Aromatic.multiplicity()), BondOrder::Single);
        assert_eq!(BondOrder::from_multiplicity(7), BondOrder::Triple);
    }

    #[test]
    fn only_single_bonds_draw_as_single() {
        assert!(!BondOrder::Single.is_multiple());
        assert!(BondOrder::Double.is_multiple());
        assert!(BondOrder::Aromatic.is_multiple());
    }
}

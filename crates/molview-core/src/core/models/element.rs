//! Per-element physical constants used for bond inference and surface generation.

use phf::phf_map;

/// Radius used for elements missing from [`VDW_RADII`].
pub const DEFAULT_VDW_RADIUS: f64 = 2.0;
/// Radius used for elements missing from [`COVALENT_RADII`].
pub const DEFAULT_COVALENT_RADIUS: f64 = 0.77;

/// Van der Waals radii in Angstroms, keyed by upper-case element symbol.
static VDW_RADII: phf::Map<&'static str, f64> = phf_map! {
    "H" => 1.2,
    "HE" => 1.4,
    "LI" => 1.82,
    "B" => 1.92,
    "C" => 1.7,
    "N" => 1.55,
    "O" => 1.52,
    "F" => 1.47,
    "NE" => 1.54,
    "NA" => 2.27,
    "MG" => 1.73,
    "AL" => 1.84,
    "SI" => 2.1,
    "P" => 1.8,
    "S" => 1.8,
    "CL" => 1.75,
    "AR" => 1.88,
    "K" => 2.75,
    "CA" => 2.31,
    "MN" => 1.73,
    "FE" => 1.72,
    "CO" => 1.67,
    "NI" => 1.63,
    "CU" => 1.4,
    "ZN" => 1.39,
    "SE" => 1.9,
    "BR" => 1.85,
    "I" => 1.98,
};

/// Covalent radii in Angstroms, keyed by upper-case element symbol.
static COVALENT_RADII: phf::Map<&'static str, f64> = phf_map! {
    "H" => 0.37,
    "LI" => 1.34,
    "B" => 0.82,
    "C" => 0.77,
    "N" => 0.75,
    "O" => 0.73,
    "F" => 0.71,
    "NA" => 1.54,
    "MG" => 1.36,
    "AL" => 1.18,
    "SI" => 1.11,
    "P" => 1.06,
    "S" => 1.02,
    "CL" => 0.99,
    "K" => 1.96,
    "CA" => 1.74,
    "MN" => 1.39,
    "FE" => 1.25,
    "CO" => 1.26,
    "NI" => 1.21,
    "CU" => 1.38,
    "ZN" => 1.2,
    "SE" => 1.16,
    "BR" => 1.14,
    "I" => 1.33,
};

/// Element symbols by atomic number, hydrogen through xenon.
const SYMBOLS: [&str; 54] = [
    "H", "He", "Li", "Be", "B", "C", "N", "O", "F", "Ne", "Na", "Mg", "Al", "Si", "P", "S", "Cl",
    "Ar", "K", "Ca", "Sc", "Ti", "V", "Cr", "Mn", "Fe", "Co", "Ni", "Cu", "Zn", "Ga", "Ge", "As",
    "Se", "Br", "Kr", "Rb", "Sr", "Y", "Zr", "Nb", "Mo", "Tc", "Ru", "Rh", "Pd", "Ag", "Cd", "In",
    "Sn", "Sb", "Te", "I", "Xe",
];

/// The symbol of the element with atomic number `number`, if it is in the table.
pub fn symbol_for_atomic_number(number: u32) -> Option<&'static str> {
    let index = usize::try_from(number).ok()?.checked_sub(1)?;
    SYMBOLS.get(index).copied()
}

/// Returns the van der Waals radius of `element`, falling back to [`DEFAULT_VDW_RADIUS`].
pub fn vdw_radius(element: &str) -> f64 {
    VDW_RADII
        .get(element.to_ascii_uppercase().as_str())
        .copied()
        .unwrap_or(DEFAULT_VDW_RADIUS)
}

/// Returns the covalent radius of `element`, falling back to [`DEFAULT_COVALENT_RADIUS`].
pub fn covalent_radius(element: &str) -> f64 {
    COVALENT_RADII
        .get(element.to_ascii_uppercase().as_str())
        .copied()
        .unwrap_or(DEFAULT_COVALENT_RADIUS)
}

/// Normalizes an element symbol to its conventional capitalization (`"CL"` -> `"Cl"`).
pub fn normalize_symbol(symbol: &str) -> String {
    let trimmed = symbol.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => {
            let mut out = String::with_capacity(trimmed.len());
            out.push(first.to_ascii_uppercase());
            out.extend(chars.map(|c| c.to_ascii_lowercase()));
            out
        }
        None => String::new(),
    }
}

/// Derives an element symbol from a PDB-style atom name such as `" CA "` or `"FE1"`.
///
/// Names starting in column 13 with a letter denote two-letter elements; otherwise the
/// first alphabetic character is the element.
pub fn guess_from_atom_name(name: &str) -> String {
    let letters: String = name
        .trim()
        .chars()
        .skip_while(|c| c.is_ascii_digit())
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    if letters.len() >= 2 {
        let candidate = normalize_symbol(&letters[..2]);
        if !name.starts_with(' ') && VDW_RADII.contains_key(candidate.to_ascii_uppercase().as_str())
        {
            return candidate;
        }
    }
    letters
        .chars()
        .next()
        .map(|c| c.to_ascii_uppercase().to_string())
        .unwrap_or_default()
}

//! # Product Name Validity Filter
//!
//! Rejects garbage and placeholder names before they pollute either ledger.
//! Applied after normalization and canonicalization, so cleanup has had a
//! chance to rescue noisy OCR output first.

use crate::canonical::CanonicalProduct;
use crate::lexicon::Lexicon;
use std::fmt;

/// Why a resolved product was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Extraction placeholder ("Article inconnu", "unavailable name", ...)
    Placeholder,
    /// Base name shorter than three characters after size stripping
    TooShort,
    /// No alphabetic characters at all
    NoLetters,
    /// Short residue dominated by digits
    NumericResidue,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Placeholder => write!(f, "placeholder name"),
            RejectReason::TooShort => write!(f, "base name too short"),
            RejectReason::NoLetters => write!(f, "no alphabetic characters"),
            RejectReason::NumericResidue => write!(f, "numeric residue"),
        }
    }
}

/// Judge whether a resolved product may enter the ledgers.
pub fn check_product(lexicon: &Lexicon, product: &CanonicalProduct) -> Result<(), RejectReason> {
    if lexicon.is_placeholder_name(&product.display_name)
        || lexicon.is_placeholder_name(&product.normalized.base)
    {
        return Err(RejectReason::Placeholder);
    }

    let base = product.normalized.spaceless_base();

    if base.chars().count() < 3 {
        return Err(RejectReason::TooShort);
    }

    let letters = base.chars().filter(|c| c.is_alphabetic()).count();
    if letters == 0 {
        return Err(RejectReason::NoLetters);
    }

    let digits = base.chars().filter(|c| c.is_ascii_digit()).count();
    if base.chars().count() <= 3 && digits > letters {
        return Err(RejectReason::NumericResidue);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::Canonicalizer;

    fn resolve(raw: &str) -> CanonicalProduct {
        Canonicalizer::new(Lexicon::shared()).resolve(raw)
    }

    #[test]
    fn test_valid_names_pass() {
        let lexicon = Lexicon::shared();
        assert!(check_product(&lexicon, &resolve("Sucre 5kg")).is_ok());
        assert!(check_product(&lexicon, &resolve("Crene Glace Caramel")).is_ok());
    }

    #[test]
    fn test_placeholders_rejected() {
        let lexicon = Lexicon::shared();
        assert_eq!(
            check_product(&lexicon, &resolve("Article inconnu")),
            Err(RejectReason::Placeholder)
        );
        assert_eq!(
            check_product(&lexicon, &resolve("unavailable name")),
            Err(RejectReason::Placeholder)
        );
    }

    #[test]
    fn test_short_bases_rejected() {
        let lexicon = Lexicon::shared();
        assert_eq!(
            check_product(&lexicon, &resolve("ab 5kg")),
            Err(RejectReason::TooShort)
        );
        assert_eq!(
            check_product(&lexicon, &resolve("")),
            Err(RejectReason::Placeholder)
        );
    }

    #[test]
    fn test_letterless_names_rejected() {
        let lexicon = Lexicon::shared();
        // Size is stripped first; a bare size line has an empty base.
        let product = resolve("12345 678");
        assert!(check_product(&lexicon, &product).is_err());
    }
}

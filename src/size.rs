//! # Size and Unit Extraction
//!
//! Pulls a normalized size token (`5kg`, `330ml`, `6x330ml`) out of a raw
//! product name. Size is part of product identity: the extracted token is
//! re-attached to the canonical key, never discarded.
//!
//! The unit alternation is built from the lexicon's unit-synonym table
//! (longest spelling first, to avoid partial matches) and compiled once per
//! extractor.

use crate::lexicon::Lexicon;
use regex::Regex;
use std::sync::Arc;

/// A size token extracted from a raw name.
#[derive(Debug, Clone, PartialEq)]
pub struct SizeToken {
    /// Pack multiplier for multipacks (`6x330ml`)
    pub multiplier: Option<u32>,
    /// Normalized numeric amount (`"5"`, `"18.9"`)
    pub amount: String,
    /// Canonical unit abbreviation (`"kg"`, `"ml"`, `"pcs"`)
    pub unit: String,
}

impl SizeToken {
    /// Normalized short form used in canonical keys: `5kg`, `6x330ml`.
    pub fn normalized(&self) -> String {
        match self.multiplier {
            Some(n) => format!("{}x{}{}", n, self.amount, self.unit),
            None => format!("{}{}", self.amount, self.unit),
        }
    }
}

/// Extracts size/unit tokens from raw product names.
pub struct SizeExtractor {
    multipack: Regex,
    single: Regex,
    lexicon: Arc<Lexicon>,
}

impl SizeExtractor {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        let units = unit_alternation(&lexicon);
        // Multipack first: "6x330ml" must not be read as "330ml".
        let multipack = Regex::new(&format!(
            r"(?i)\b(\d+)\s*[x*]\s*(\d+(?:[.,]\d+)?)\s*({})\b",
            units
        ))
        .expect("multipack size pattern should be valid");
        let single = Regex::new(&format!(r"(?i)(\d+(?:[.,]\d+)?)\s*({})\b", units))
            .expect("single size pattern should be valid");

        Self {
            multipack,
            single,
            lexicon,
        }
    }

    /// Extract the first size token from `name`.
    ///
    /// Returns the remainder of the name (size span removed, separators
    /// preserved otherwise) together with the token, if any. Underscores are
    /// treated as spaces so that already-suffixed keys (`sucre_5kg`)
    /// re-extract to the same token.
    pub fn extract(&self, name: &str) -> (String, Option<SizeToken>) {
        let hay = name.replace('_', " ");

        if let Some(caps) = self.multipack.captures(&hay) {
            let full = caps.get(0).expect("match 0 is always present");
            let multiplier = caps[1].parse::<u32>().ok();
            let token = SizeToken {
                multiplier,
                amount: normalize_amount(&caps[2]),
                unit: self.fold_unit(&caps[3]),
            };
            let remainder = remove_span(&hay, full.start(), full.end());
            return (remainder, Some(token));
        }

        if let Some(caps) = self.single.captures(&hay) {
            let full = caps.get(0).expect("match 0 is always present");
            let token = SizeToken {
                multiplier: None,
                amount: normalize_amount(&caps[1]),
                unit: self.fold_unit(&caps[2]),
            };
            let remainder = remove_span(&hay, full.start(), full.end());
            return (remainder, Some(token));
        }

        (hay, None)
    }

    /// Remove every size token from `name`. Used by the merge resolver to
    /// check what is left of a suspected size-only continuation line.
    pub fn strip_all(&self, name: &str) -> String {
        let hay = name.replace('_', " ");
        let without_packs = self.multipack.replace_all(&hay, " ");
        self.single.replace_all(&without_packs, " ").into_owned()
    }

    fn fold_unit(&self, raw: &str) -> String {
        self.lexicon
            .fold_unit(raw)
            .map(|u| u.to_string())
            .unwrap_or_else(|| raw.to_lowercase())
    }
}

/// Build the unit alternation from the lexicon's unit-synonym spellings,
/// longest first so that "millilitres" wins over "ml" over "l".
fn unit_alternation(lexicon: &Lexicon) -> String {
    let mut spellings: Vec<&str> = lexicon.unit_spellings();
    spellings.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    spellings
        .into_iter()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join("|")
}

/// Normalize a numeric amount: decimal comma to dot, drop a redundant
/// fractional part ("5.0" and "5" must produce the same token).
fn normalize_amount(raw: &str) -> String {
    let dotted = raw.replace(',', ".");
    match dotted.parse::<f64>() {
        Ok(v) if v.fract() == 0.0 && v >= 0.0 && v < u64::MAX as f64 => {
            format!("{}", v as u64)
        }
        _ => dotted,
    }
}

fn remove_span(hay: &str, start: usize, end: usize) -> String {
    let mut out = String::with_capacity(hay.len());
    out.push_str(&hay[..start]);
    out.push(' ');
    out.push_str(&hay[end..]);
    out
}

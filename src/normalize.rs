//! # Name Normalization Pipeline
//!
//! Deterministic normalization of OCR-derived product names, implemented as
//! an explicit ordered list of pure `&str -> String` stages composed by a
//! small pipeline runner. Each stage is independently unit-testable.
//!
//! Pipeline contract: applying the pipeline twice is a no-op,
//! `normalize(normalize(x)) == normalize(x)`.

use crate::correction::WordCorrector;
use crate::lexicon::Lexicon;
use crate::size::SizeExtractor;
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;
use tracing::trace;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref PARENTHETICAL: Regex =
        Regex::new(r"\([^)]*\)|\[[^\]]*\]").expect("parenthetical pattern should be valid");
    static ref SKU_TOKEN: Regex =
        Regex::new(r"^[a-z]\d+[a-z]?\d*$").expect("SKU token pattern should be valid");
    static ref LONG_DIGIT_RUN: Regex =
        Regex::new(r"^\d{5,}$").expect("digit run pattern should be valid");
    static ref ONE_BETWEEN_LETTERS: Regex =
        Regex::new(r"([a-z])1([a-z])").expect("1-between-letters pattern should be valid");
    static ref ZERO_BETWEEN_LETTERS: Regex =
        Regex::new(r"([a-z])0([a-z])").expect("0-between-letters pattern should be valid");
    static ref SPLIT_UNIT_FIXES: Vec<(Regex, &'static str)> = vec![
        (
            Regex::new(r"\b(\d+(?:\.\d+)?) ?m l\b").expect("split ml pattern should be valid"),
            "${1}ml",
        ),
        (
            Regex::new(r"\b(\d+(?:\.\d+)?) ?k g\b").expect("split kg pattern should be valid"),
            "${1}kg",
        ),
        (
            Regex::new(r"\b(\d+(?:\.\d+)?) ?c l\b").expect("split cl pattern should be valid"),
            "${1}cl",
        ),
        (
            Regex::new(r"\b(\d+(?:\.\d+)?) ?l t\b").expect("split lt pattern should be valid"),
            "${1}lt",
        ),
    ];
}

/// Context handed to every stage function.
pub struct StageCtx<'a> {
    pub lexicon: &'a Lexicon,
    pub corrector: &'a WordCorrector,
}

/// A named pure transformation stage.
pub struct Stage {
    pub name: &'static str,
    pub apply: fn(&StageCtx<'_>, &str) -> String,
}

/// A normalized name split into its identity parts.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedName {
    /// Cleaned base name, single-spaced lowercase words
    pub base: String,
    /// Normalized size token, if one was present (`"5kg"`)
    pub size: Option<String>,
}

impl NormalizedName {
    /// Suffixed form: `base_5kg`, or just the base when no size was found.
    pub fn joined(&self) -> String {
        match &self.size {
            Some(size) if !self.base.is_empty() => format!("{}_{}", self.base, size),
            Some(size) => size.clone(),
            None => self.base.clone(),
        }
    }

    /// Base with spaces removed, the form used for canonical keys.
    pub fn spaceless_base(&self) -> String {
        self.base.chars().filter(|c| !c.is_whitespace()).collect()
    }
}

/// Staged name normalizer.
pub struct Normalizer {
    lexicon: Arc<Lexicon>,
    corrector: WordCorrector,
    size: SizeExtractor,
    stages: Vec<Stage>,
}

impl Normalizer {
    pub fn new(lexicon: Arc<Lexicon>) -> Self {
        Self {
            corrector: WordCorrector::new(lexicon.clone()),
            size: SizeExtractor::new(lexicon.clone()),
            stages: default_stages(),
            lexicon,
        }
    }

    /// The ordered stage list (exposed for stage-level tests).
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn size_extractor(&self) -> &SizeExtractor {
        &self.size
    }

    /// Normalize a raw name into its base and size parts.
    pub fn normalize_parts(&self, raw: &str) -> NormalizedName {
        let (remainder, token) = self.size.extract(raw);
        let ctx = StageCtx {
            lexicon: &self.lexicon,
            corrector: &self.corrector,
        };

        let mut text = remainder;
        for stage in &self.stages {
            let next = (stage.apply)(&ctx, &text);
            if next != text {
                trace!(stage = %stage.name, before = %text, after = %next, "Normalization stage");
            }
            text = next;
        }

        // The split-unit stage can surface a size token that was invisible in
        // the raw text ("2 k g" -> "2kg"); extract again so the suffixed form
        // reaches a fixpoint on the first pass.
        let mut size = token.map(|t| t.normalized());
        if size.is_none() {
            let (rest, surfaced) = self.size.extract(&text);
            if let Some(surfaced) = surfaced {
                size = Some(surfaced.normalized());
                text = rest.split_whitespace().collect::<Vec<_>>().join(" ");
            }
        }

        NormalizedName { base: text, size }
    }

    /// Full normalization to the suffixed form (`creme glace_1l`).
    pub fn normalize(&self, raw: &str) -> String {
        self.normalize_parts(raw).joined()
    }
}

/// The canonical stage order. Separator collapse runs before the token-based
/// stages so that punctuation never hides a token from them.
pub fn default_stages() -> Vec<Stage> {
    vec![
        Stage {
            name: "fold-case-and-diacritics",
            apply: fold_case_and_diacritics,
        },
        Stage {
            name: "strip-parentheticals",
            apply: strip_parentheticals,
        },
        Stage {
            name: "collapse-separators",
            apply: collapse_separators,
        },
        Stage {
            name: "strip-sku-codes",
            apply: strip_sku_codes,
        },
        Stage {
            name: "strip-noise-words",
            apply: strip_noise_words,
        },
        Stage {
            name: "fix-split-units",
            apply: fix_split_units,
        },
        Stage {
            name: "fix-word-misreads",
            apply: fix_word_misreads,
        },
        Stage {
            name: "fix-char-confusions",
            apply: fix_char_confusions,
        },
        Stage {
            name: "rejoin-letter-fragments",
            apply: rejoin_letter_fragments,
        },
        Stage {
            name: "correct-words",
            apply: correct_words,
        },
        Stage {
            name: "final-tidy",
            apply: collapse_separators,
        },
    ]
}

/// Lowercase and strip diacritics (NFD, combining marks dropped). Ligatures
/// that NFD leaves alone are mapped explicitly.
fn fold_case_and_diacritics(_ctx: &StageCtx<'_>, text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.nfd() {
        if is_combining_mark(ch) {
            continue;
        }
        match ch {
            'œ' | 'Œ' => out.push_str("oe"),
            'æ' | 'Æ' => out.push_str("ae"),
            'ß' => out.push_str("ss"),
            _ => {
                for lc in ch.to_lowercase() {
                    out.push(lc);
                }
            }
        }
    }
    out
}

/// Remove parenthetical and bracketed segments (printed codes, pack notes).
fn strip_parentheticals(_ctx: &StageCtx<'_>, text: &str) -> String {
    PARENTHETICAL.replace_all(text, " ").into_owned()
}

/// Collapse every non-alphanumeric run to a single space.
fn collapse_separators(_ctx: &StageCtx<'_>, text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            out.push(ch);
        } else {
            out.push(' ');
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop SKU-like tokens (`a123`, `x2b4`) and long bare digit runs (barcodes).
fn strip_sku_codes(_ctx: &StageCtx<'_>, text: &str) -> String {
    text.split_whitespace()
        .filter(|token| !SKU_TOKEN.is_match(token) && !LONG_DIGIT_RUN.is_match(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop tokens that carry no product identity.
fn strip_noise_words(ctx: &StageCtx<'_>, text: &str) -> String {
    text.split_whitespace()
        .filter(|token| !ctx.lexicon.is_noise_word(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Fix units the OCR split into separate letters (`330 m l` -> `330ml`).
/// Explicit patterns, independent of the dictionary.
fn fix_split_units(_ctx: &StageCtx<'_>, text: &str) -> String {
    let mut out = text.to_string();
    for (pattern, replacement) in SPLIT_UNIT_FIXES.iter() {
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out
}

/// Whole-word OCR misread fixes from the lexicon table.
fn fix_word_misreads(ctx: &StageCtx<'_>, text: &str) -> String {
    text.split_whitespace()
        .map(|token| match ctx.lexicon.word_misread(token) {
            Some(fix) => fix.to_string(),
            None => token.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Targeted digit/letter confusions *between letters* (`vo1aille` ->
/// `volaille`, `c0o` stays). Applied to a fixpoint; matches cannot overlap
/// within one pass.
fn fix_char_confusions(_ctx: &StageCtx<'_>, text: &str) -> String {
    let mut out = text.to_string();
    for _ in 0..4 {
        let next = ONE_BETWEEN_LETTERS.replace_all(&out, "${1}l${2}").into_owned();
        let next = ZERO_BETWEEN_LETTERS
            .replace_all(&next, "${1}o${2}")
            .into_owned();
        if next == out {
            break;
        }
        out = next;
    }
    out
}

/// Rejoin runs of single-letter tokens produced by OCR letter spacing
/// (`s p r i t e` -> `sprite`). Only runs of three or more letters are
/// joined, so legitimate short words (French `a`, `d`) survive.
fn rejoin_letter_fragments(_ctx: &StageCtx<'_>, text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        let mut run_end = i;
        while run_end < tokens.len()
            && tokens[run_end].chars().count() == 1
            && tokens[run_end].chars().all(|c| c.is_alphabetic())
        {
            run_end += 1;
        }

        if run_end - i >= 3 {
            out.push(tokens[i..run_end].concat());
            i = run_end;
        } else {
            out.push(tokens[i].to_string());
            i += 1;
        }
    }

    out.join(" ")
}

/// Dictionary-driven word correction: fragment rejoining first, then
/// per-token OCR correction for unknown words. Tokens containing digits are
/// left alone (quantities, residues the validity filter will judge).
fn correct_words(ctx: &StageCtx<'_>, text: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        if i + 1 < tokens.len() {
            if let Some(joined) = ctx.corrector.rejoin_pair(tokens[i], tokens[i + 1]) {
                out.push(joined);
                i += 2;
                continue;
            }
        }

        let token = tokens[i];
        if token.chars().any(|c| c.is_ascii_digit()) || token.chars().count() < 3 {
            out.push(token.to_string());
        } else {
            match ctx.corrector.correct(token) {
                Some(fix) => out.push(fix),
                None => out.push(token.to_string()),
            }
        }
        i += 1;
    }

    out.join(" ")
}

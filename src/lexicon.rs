//! # Product Lexicon
//!
//! Immutable lookup tables shared by the normalization, correction,
//! canonicalization and category-detection components: multilingual synonym
//! groups, the known-product dictionary, OCR misread tables, letter-confusion
//! pairs, noise words, placeholder sentinels, unit synonyms, category rules
//! and currency symbols.
//!
//! The lexicon is built once at startup and injected (`Arc<Lexicon>`) into
//! every component that needs it, so tests can swap in a reduced table set.
//! A process-wide built-in instance is available through [`Lexicon::shared`].

use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Synonym groups: every entry of a group maps to the group's first word,
/// the canonical root. French roots are used, matching the receipts this
/// system actually sees; English/Lingala/Swahili variants and brand spellings
/// fold into them.
const SYNONYM_GROUPS: &[&[&str]] = &[
    // Staples
    &["lait", "milk", "leche", "maziwa", "miliki", "mabele"],
    &["sucre", "sugar", "sukari", "sukali"],
    &["riz", "rice", "mchele", "wali", "loso"],
    &["farine", "flour", "unga", "fufu"],
    &["sel", "salt", "chumvi", "mungwa"],
    &["huile", "oil", "mafuta", "aceite"],
    &["pain", "bread", "mkate", "mapa", "lipa"],
    &["eau", "water", "maji", "mai"],
    &["the", "tea", "chai"],
    &["cafe", "coffee", "kahawa"],
    // Fresh produce
    &["tomate", "tomato", "nyanya", "tomati"],
    &["oignon", "onion", "kitunguu", "litungulu"],
    &["banane", "banana", "ndizi", "likemba"],
    &["haricot", "beans", "maharagwe", "madesu"],
    &["pomme", "apple", "tufaha"],
    &["manioc", "cassava", "muhogo", "songo"],
    // Protein
    &["poulet", "chicken", "kuku", "nsoso"],
    &["poisson", "fish", "samaki", "mbisi"],
    &["viande", "meat", "nyama"],
    &["oeuf", "oeufs", "egg", "eggs", "mayai", "maki"],
    // Dairy and fats
    &["beurre", "butter", "siagi"],
    &["fromage", "cheese", "jibini"],
    &["yaourt", "yogurt", "yoghurt", "mtindi"],
    &["margarine", "blueband"],
    // Drinks and brands
    &["coca", "cocacola", "coke", "cola"],
    &["fanta"],
    &["sprite"],
    &["biere", "beer", "pombe", "masanga"],
    &["castel"],
    &["primus"],
    &["skol"],
    &["simba"],
    &["jus", "juice", "juisi"],
    // Household and hygiene
    &["savon", "soap", "sabuni", "sabumu"],
    &["omo"],
    &["dentifrice", "toothpaste", "colgate"],
    &["lessive", "detergent"],
    &["bougie", "candle", "mshumaa"],
    &["allumette", "matches", "kibiriti"],
    // Packaged brands
    &["maggi", "cube", "bouillon"],
    &["nido"],
    &["cerelac"],
    &["cowbell"],
    &["spaghetti", "pates", "pasta", "tambi"],
    &["biscuit", "biscuits", "cookie", "biskuti"],
    &["tomate concentree", "concentre de tomate"],
];

/// Known OCR word-level misreadings observed in receipt extractions.
const WORD_MISREADS: &[(&str, &str)] = &[
    ("m1lk", "milk"),
    ("mi1k", "milk"),
    ("mllk", "milk"),
    ("su9ar", "sugar"),
    ("5ugar", "sugar"),
    ("sugor", "sugar"),
    ("lalt", "lait"),
    ("la1t", "lait"),
    ("0mo", "omo"),
    ("c0ca", "coca"),
    ("c0la", "cola"),
    ("cocaco1a", "cocacola"),
    ("far1ne", "farine"),
    ("hu1le", "huile"),
    ("hvile", "huile"),
    ("sucr3", "sucre"),
    ("p0ulet", "poulet"),
    ("po1sson", "poisson"),
    ("blscuit", "biscuit"),
    ("b1scuit", "biscuit"),
    ("spr1te", "sprite"),
    ("fanla", "fanta"),
    ("pr1mus", "primus"),
    ("sav0n", "savon"),
    ("0eufs", "oeufs"),
    ("yaourl", "yaourt"),
];

/// OCR letter-confusion pairs; symmetric, checked in both directions.
const CONFUSION_PAIRS: &[(char, char)] = &[
    ('0', 'o'),
    ('1', 'l'),
    ('1', 'i'),
    ('i', 'l'),
    ('5', 's'),
    ('8', 'b'),
    ('6', 'b'),
    ('2', 'z'),
    ('9', 'g'),
    ('d', 'o'),
    ('e', 'c'),
    ('u', 'v'),
    ('n', 'h'),
    ('t', 'f'),
];

/// Tokens carrying no product identity; stripped during normalization.
const NOISE_WORDS: &[&str] = &[
    "unit", "unite", "unites", "piece", "pieces", "medium", "moyen", "moyenne", "grand", "grande",
    "petit", "petite", "promo", "promotion", "offre", "solde", "remise", "qty", "qte", "lot",
    "article", "produit", "item", "ref", "tva", "ttc", "ht",
];

/// Residual words that mark a size-only continuation line on a receipt
/// (e.g. `"18.9 L Recharge"` continuing the previous item).
const CONTINUATION_WORDS: &[&str] = &[
    "recharge", "refill", "consigne", "bouteille", "bidon", "pot", "paquet",
];

/// Placeholder names produced by the extraction collaborator when it cannot
/// read an item; these must never reach either ledger.
const PLACEHOLDER_NAMES: &[&str] = &[
    "unavailable name",
    "nom indisponible",
    "article inconnu",
    "produit inconnu",
    "unknown item",
    "unknown product",
    "unknown",
    "inconnu",
    "sans nom",
    "n/a",
];

/// Unit spellings folded to canonical abbreviations.
const UNIT_SYNONYMS: &[(&str, &str)] = &[
    ("kg", "kg"),
    ("kgs", "kg"),
    ("kilo", "kg"),
    ("kilos", "kg"),
    ("kilogram", "kg"),
    ("kilograms", "kg"),
    ("kilogramme", "kg"),
    ("kilogrammes", "kg"),
    ("g", "g"),
    ("gr", "g"),
    ("gram", "g"),
    ("grams", "g"),
    ("gramme", "g"),
    ("grammes", "g"),
    ("l", "l"),
    ("lt", "l"),
    ("ltr", "l"),
    ("liter", "l"),
    ("liters", "l"),
    ("litre", "l"),
    ("litres", "l"),
    ("ml", "ml"),
    ("milliliter", "ml"),
    ("milliliters", "ml"),
    ("millilitre", "ml"),
    ("millilitres", "ml"),
    ("cl", "cl"),
    ("centilitre", "cl"),
    ("centilitres", "cl"),
    ("dl", "dl"),
    ("oz", "oz"),
    ("lb", "lb"),
    ("lbs", "lb"),
    ("pc", "pcs"),
    ("pcs", "pcs"),
    ("pce", "pcs"),
    ("pack", "pack"),
    ("packs", "pack"),
    ("sachet", "sachet"),
    ("sachets", "sachet"),
];

/// Data-driven category rules: first rule whose keyword matches wins.
const CATEGORY_RULES: &[(&str, &[&str])] = &[
    (
        "staples",
        &["riz", "farine", "sucre", "sel", "huile", "pain", "manioc", "spaghetti", "maggi"],
    ),
    (
        "dairy",
        &["lait", "fromage", "yaourt", "beurre", "margarine", "nido", "cerelac", "cowbell"],
    ),
    (
        "beverages",
        &["eau", "coca", "fanta", "sprite", "biere", "castel", "primus", "skol", "simba", "jus", "the", "cafe"],
    ),
    (
        "hygiene",
        &["savon", "omo", "dentifrice", "lessive", "shampooing"],
    ),
    (
        "protein",
        &["poulet", "poisson", "viande", "oeuf", "haricot"],
    ),
    (
        "produce",
        &["tomate", "oignon", "banane", "pomme", "legume", "fruit"],
    ),
    ("household", &["bougie", "allumette", "biscuit"]),
];

/// Currency spellings and symbols folded to ISO-style codes.
const CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("fc", "CDF"),
    ("cdf", "CDF"),
    ("franc", "CDF"),
    ("francs", "CDF"),
    ("$", "USD"),
    ("usd", "USD"),
    ("dollar", "USD"),
    ("dollars", "USD"),
    ("€", "EUR"),
    ("eur", "EUR"),
    ("euro", "EUR"),
    ("euros", "EUR"),
];

/// A single category rule consumed by the generic category lookup.
#[derive(Debug, Clone)]
pub struct CategoryRule {
    pub category: String,
    pub keywords: Vec<String>,
}

/// Immutable lookup tables for name resolution.
///
/// Construction is cheap enough to do once per process; all consumers hold an
/// `Arc` and never mutate it.
pub struct Lexicon {
    synonym_roots: HashMap<String, String>,
    dictionary: HashSet<String>,
    dictionary_sorted: Vec<String>,
    word_misreads: HashMap<String, String>,
    confusion_pairs: HashSet<(char, char)>,
    noise_words: HashSet<String>,
    continuation_words: HashSet<String>,
    placeholder_names: Vec<String>,
    unit_synonyms: HashMap<String, String>,
    category_rules: Vec<CategoryRule>,
    currency_symbols: HashMap<String, String>,
}

lazy_static! {
    static ref BUILTIN: Arc<Lexicon> = Arc::new(Lexicon::builtin());
}

impl Lexicon {
    /// Build the full built-in table set.
    pub fn builtin() -> Self {
        let mut synonym_roots = HashMap::new();
        let mut dictionary = HashSet::new();

        for group in SYNONYM_GROUPS {
            let root = group[0];
            for variant in *group {
                // Synonyms are matched against space-stripped text.
                let key: String = variant.chars().filter(|c| !c.is_whitespace()).collect();
                synonym_roots.insert(key.clone(), root.to_string());
                for word in variant.split_whitespace() {
                    dictionary.insert(word.to_string());
                }
                dictionary.insert(key);
            }
        }

        // Misread targets and continuation words are legitimate words too.
        for (_, to) in WORD_MISREADS {
            dictionary.insert(to.to_string());
        }
        for word in CONTINUATION_WORDS {
            dictionary.insert(word.to_string());
        }

        let mut dictionary_sorted: Vec<String> = dictionary.iter().cloned().collect();
        dictionary_sorted.sort();

        let mut confusion_pairs = HashSet::new();
        for (a, b) in CONFUSION_PAIRS {
            confusion_pairs.insert((*a, *b));
            confusion_pairs.insert((*b, *a));
        }

        Self {
            synonym_roots,
            dictionary,
            dictionary_sorted,
            word_misreads: WORD_MISREADS
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            confusion_pairs,
            noise_words: NOISE_WORDS.iter().map(|w| w.to_string()).collect(),
            continuation_words: CONTINUATION_WORDS.iter().map(|w| w.to_string()).collect(),
            placeholder_names: PLACEHOLDER_NAMES.iter().map(|w| w.to_string()).collect(),
            unit_synonyms: UNIT_SYNONYMS
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            category_rules: CATEGORY_RULES
                .iter()
                .map(|(category, keywords)| CategoryRule {
                    category: category.to_string(),
                    keywords: keywords.iter().map(|k| k.to_string()).collect(),
                })
                .collect(),
            currency_symbols: CURRENCY_SYMBOLS
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
        }
    }

    /// Process-wide built-in instance, initialized on first access.
    pub fn shared() -> Arc<Lexicon> {
        BUILTIN.clone()
    }

    /// Canonical root for a space-stripped synonym, if known.
    pub fn canonical_root(&self, spaceless: &str) -> Option<&str> {
        self.synonym_roots.get(spaceless).map(|s| s.as_str())
    }

    /// Whether a word is in the known product/brand dictionary.
    pub fn is_known_word(&self, word: &str) -> bool {
        self.dictionary.contains(word)
    }

    /// Dictionary in deterministic (sorted) order, for fuzzy scans.
    pub fn dictionary_words(&self) -> &[String] {
        &self.dictionary_sorted
    }

    /// Direct OCR misread correction for a whole word, if known.
    pub fn word_misread(&self, word: &str) -> Option<&str> {
        self.word_misreads.get(word).map(|s| s.as_str())
    }

    /// Whether two characters are a known OCR confusion pair.
    pub fn confusable(&self, a: char, b: char) -> bool {
        self.confusion_pairs.contains(&(a, b))
    }

    /// Characters a given character is commonly misread as.
    pub fn confusion_candidates(&self, c: char) -> Vec<char> {
        let mut out: Vec<char> = self
            .confusion_pairs
            .iter()
            .filter(|(a, _)| *a == c)
            .map(|(_, b)| *b)
            .collect();
        out.sort_unstable();
        out
    }

    pub fn is_noise_word(&self, word: &str) -> bool {
        self.noise_words.contains(word)
    }

    pub fn is_continuation_word(&self, word: &str) -> bool {
        self.continuation_words.contains(word)
    }

    /// Whether a (lowercased, trimmed) name is an extraction placeholder.
    pub fn is_placeholder_name(&self, name: &str) -> bool {
        let lowered = name.trim().to_lowercase();
        if lowered.is_empty() {
            return true;
        }
        self.placeholder_names
            .iter()
            .any(|p| lowered == *p || lowered.starts_with(p.as_str()))
    }

    /// Whether a name matches the "unknown" sentinel family used to gate
    /// community-ledger writes (item names and store names alike).
    pub fn is_unknown_sentinel(&self, name: &str) -> bool {
        let lowered = name.trim().to_lowercase();
        if lowered.is_empty() {
            return true;
        }
        self.placeholder_names
            .iter()
            .any(|p| lowered.contains(p.as_str()))
    }

    /// All space-stripped variants mapping to a canonical root, in sorted
    /// order. Used to expand search keywords.
    pub fn synonym_variants(&self, root: &str) -> Vec<&str> {
        let mut variants: Vec<&str> = self
            .synonym_roots
            .iter()
            .filter(|(_, r)| r.as_str() == root)
            .map(|(variant, _)| variant.as_str())
            .collect();
        variants.sort();
        variants
    }

    /// All unit spellings known to the lexicon, for regex alternations.
    pub fn unit_spellings(&self) -> Vec<&str> {
        self.unit_synonyms.keys().map(|s| s.as_str()).collect()
    }

    /// Fold a unit spelling to its canonical abbreviation.
    pub fn fold_unit(&self, unit: &str) -> Option<&str> {
        self.unit_synonyms
            .get(unit.to_lowercase().as_str())
            .map(|s| s.as_str())
    }

    pub fn category_rules(&self) -> &[CategoryRule] {
        &self.category_rules
    }

    /// Fold a currency symbol or spelling to an ISO-style code. Unrecognized
    /// codes are uppercased and passed through.
    pub fn fold_currency(&self, currency: &str) -> String {
        let trimmed = currency.trim();
        match self.currency_symbols.get(trimmed.to_lowercase().as_str()) {
            Some(code) => code.clone(),
            None => trimmed.to_uppercase(),
        }
    }
}

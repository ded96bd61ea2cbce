#[cfg(test)]
mod tests {
    use soko_prices::canonical::Canonicalizer;
    use soko_prices::lexicon::Lexicon;
    use soko_prices::normalize::Normalizer;
    use soko_prices::validity::{check_product, RejectReason};

    fn canonicalizer() -> Canonicalizer {
        Canonicalizer::new(Lexicon::shared())
    }

    #[test]
    fn test_normalize_is_idempotent_over_receipt_corpus() {
        let normalizer = Normalizer::new(Lexicon::shared());
        let samples = [
            "Sucre 5kg",
            "SUCRE ROUX 1 kg",
            "Lait Nido 400g",
            "S p r i t e 33cl",
            "Crene Glace Caramel 1lt(lb)",
            "Eau minérale 18,9 L Recharge",
            "Café moulu (a12) 250 g",
            "OMO Machine 2 k g",
            "Thé vert de Chine",
            "m1lk",
            "Coca-Cola 6x330ml",
            "Article inconnu",
            "12345",
            "",
        ];

        for sample in samples {
            let once = normalizer.normalize(sample);
            let twice = normalizer.normalize(&once);
            assert_eq!(
                once, twice,
                "normalize(normalize(x)) must equal normalize(x) for '{}'",
                sample
            );
        }
    }

    #[test]
    fn test_size_is_part_of_identity() {
        let c = canonicalizer();
        assert_ne!(c.canonical_key("Sucre 5kg"), c.canonical_key("Sucre 1kg"));
        assert_eq!(c.canonical_key("Sucre 5kg"), c.canonical_key("SUCRE 5 kg"));
        assert_eq!(c.canonical_key("Sucre 5kg"), c.canonical_key("Sugar 5 kilograms"));
    }

    #[test]
    fn test_ocr_spacing_fix() {
        let c = canonicalizer();
        assert_eq!(c.canonical_key("S p r i t e"), c.canonical_key("Sprite"));
    }

    #[test]
    fn test_synonym_canonicalization() {
        let c = canonicalizer();
        assert_eq!(c.canonical_key("Milk"), c.canonical_key("Lait"));
        assert_eq!(c.canonical_key("Milk"), "lait");
    }

    #[test]
    fn test_word_boundary_guard() {
        let c = canonicalizer();
        // "te" is a substring of "castel lite", but synonyms may only match
        // the whole string or a first/last word.
        assert_ne!(c.canonical_key("Castel Lite"), c.canonical_key("The"));
    }

    #[test]
    fn test_multipack_and_weight_keys() {
        let c = canonicalizer();
        assert_eq!(c.canonical_key("Sprite 6x330ml"), "sprite_6x330ml");
        assert_eq!(c.canonical_key("Sprite 330ml"), "sprite_330ml");
        assert_ne!(
            c.canonical_key("Sprite 6x330ml"),
            c.canonical_key("Sprite 330ml")
        );
    }

    #[test]
    fn test_validity_filter_after_cleanup() {
        let lexicon = Lexicon::shared();
        let c = canonicalizer();

        // Noisy but rescuable names survive
        assert!(check_product(&lexicon, &c.resolve("  SUCRE (promo) 5kg ")).is_ok());

        // Placeholders and residues are rejected
        assert_eq!(
            check_product(&lexicon, &c.resolve("Article inconnu")),
            Err(RejectReason::Placeholder)
        );
        assert_eq!(
            check_product(&lexicon, &c.resolve("ab 1kg")),
            Err(RejectReason::TooShort)
        );
        assert!(check_product(&lexicon, &c.resolve("9h8")).is_err());
    }
}

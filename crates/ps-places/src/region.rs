//! Matching places against a target canton.
//!
//! The provider localizes administrative names ("Aargau", "Argovie", "AG"), so a
//! region is compared through a set of normalized aliases instead of a single
//! string.

use crate::place::{AddressComponent, RawPlaceRecord};
use crate::constants::ADMIN_AREA_LEVEL_1;

/// Swiss cantons: canonical name followed by its common aliases.
const CANTONS: &[&[&str]] = &[
    &["Aargau", "Argovie", "Argovia", "AG"],
    &["Appenzell Ausserrhoden", "Appenzell Rhodes-Extérieures", "Appenzello Esterno", "AR"],
    &["Appenzell Innerrhoden", "Appenzell Rhodes-Intérieures", "Appenzello Interno", "AI"],
    &["Basel-Landschaft", "Bâle-Campagne", "Basilea Campagna", "Basel-Country", "BL"],
    &["Basel-Stadt", "Bâle-Ville", "Basilea Città", "Basel-City", "BS"],
    &["Bern", "Berne", "Berna", "BE"],
    &["Fribourg", "Freiburg", "Friburgo", "FR"],
    &["Geneva", "Genève", "Genf", "Ginevra", "GE"],
    &["Glarus", "Glaris", "Glarona", "GL"],
    &["Graubünden", "Grisons", "Grigioni", "Grischun", "GR"],
    &["Jura", "Giura", "JU"],
    &["Lucerne", "Luzern", "Lucerna", "LU"],
    &["Neuchâtel", "Neuenburg", "NE"],
    &["Nidwalden", "Nidwald", "Nidvaldo", "NW"],
    &["Obwalden", "Obwald", "Obvaldo", "OW"],
    &["Schaffhausen", "Schaffhouse", "Sciaffusa", "SH"],
    &["Schwyz", "Schwytz", "Svitto", "SZ"],
    &["Solothurn", "Soleure", "Soletta", "SO"],
    &["St. Gallen", "Sankt Gallen", "Saint-Gall", "San Gallo", "SG"],
    &["Thurgau", "Thurgovie", "Turgovia", "TG"],
    &["Ticino", "Tessin", "TI"],
    &["Uri", "UR"],
    &["Valais", "Wallis", "Vallese", "VS"],
    &["Vaud", "Waadt", "VD"],
    &["Zug", "Zoug", "Zugo", "ZG"],
    &["Zürich", "Zurich", "Zurigo", "ZH"],
];

const NAME_PREFIXES: &[&str] = &["canton of ", "canton de ", "canton du ", "cantone ", "canton ", "kanton "];

/// A target region and every spelling that should count as a match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Region {
    name: String,
    aliases: Vec<String>,
}

impl Region {
    /// Resolve `name` against the known cantons. Unknown names only match
    /// themselves (still case- and diacritic-insensitively).
    pub fn new(name: &str) -> Self {
        let wanted = normalize(name);
        match CANTONS
            .iter()
            .find(|names| names.iter().any(|alias| normalize(alias) == wanted))
        {
            Some(names) => Self {
                name: names[0].to_string(),
                aliases: names.iter().map(|alias| normalize(alias)).collect(),
            },
            None => Self {
                name: name.trim().to_string(),
                aliases: vec![wanted],
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_alias(&self, candidate: &str) -> bool {
        let candidate = normalize(candidate);
        !candidate.is_empty() && self.aliases.iter().any(|alias| *alias == candidate)
    }

    /// Whether the level-1 administrative component names this region. No such
    /// component means no match.
    pub fn matches(&self, components: &[AddressComponent]) -> bool {
        components
            .iter()
            .find(|c| c.has_type(ADMIN_AREA_LEVEL_1))
            .is_some_and(|c| {
                self.is_alias(&c.long_name) || c.short_name.as_deref().is_some_and(|s| self.is_alias(s))
            })
    }

    pub fn contains(&self, record: &RawPlaceRecord) -> bool {
        self.matches(&record.address_components)
    }
}

/// Lowercase, strip diacritics and punctuation, collapse whitespace and drop
/// "Canton of"-style prefixes.
pub fn normalize(name: &str) -> String {
    let mut folded = String::with_capacity(name.len());
    for c in name.trim().chars().flat_map(char::to_lowercase) {
        match c {
            'à' | 'á' | 'â' | 'ä' | 'ã' | 'å' => folded.push('a'),
            'ç' => folded.push('c'),
            'è' | 'é' | 'ê' | 'ë' => folded.push('e'),
            'ì' | 'í' | 'î' | 'ï' => folded.push('i'),
            'ñ' => folded.push('n'),
            'ò' | 'ó' | 'ô' | 'ö' | 'õ' => folded.push('o'),
            'ù' | 'ú' | 'û' | 'ü' => folded.push('u'),
            'ÿ' => folded.push('y'),
            'ß' => folded.push_str("ss"),
            '-' | '.' | '_' | '\'' => folded.push(' '),
            c => folded.push(c),
        }
    }
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");
    NAME_PREFIXES
        .iter()
        .find_map(|prefix| collapsed.strip_prefix(prefix))
        .map(str::to_owned)
        .unwrap_or(collapsed)
}

/// Directory-safe name for a canton, `unknown` when there is none.
pub fn folder_name(canton: &str) -> String {
    let normalized = normalize(canton);
    if normalized.is_empty() {
        return "unknown".to_string();
    }
    normalized
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admin_area(long_name: &str, short_name: Option<&str>) -> AddressComponent {
        AddressComponent {
            long_name: long_name.to_string(),
            short_name: short_name.map(str::to_string),
            types: vec![ADMIN_AREA_LEVEL_1.to_string(), "political".to_string()],
        }
    }

    fn locality(name: &str) -> AddressComponent {
        AddressComponent {
            long_name: name.to_string(),
            short_name: None,
            types: vec!["locality".to_string(), "political".to_string()],
        }
    }

    #[test]
    fn normalize_folds_case_diacritics_and_prefixes() {
        assert_eq!(normalize("  Zürich "), "zurich");
        assert_eq!(normalize("Bâle-Campagne"), "bale campagne");
        assert_eq!(normalize("Canton of Geneva"), "geneva");
        assert_eq!(normalize("Kanton Aargau"), "aargau");
        assert_eq!(normalize("St. Gallen"), "st gallen");
    }

    #[test]
    fn region_resolves_aliases() {
        let region = Region::new("argovie");
        assert_eq!(region.name(), "Aargau");
        assert!(region.is_alias("AARGAU"));
        assert!(region.is_alias("AG"));
        assert!(!region.is_alias("Zug"));
    }

    #[test]
    fn matches_level_one_component_only() {
        // Arrange
        let region = Region::new("Aargau");
        let inside = vec![locality("Aarau"), admin_area("Aargau", Some("AG"))];
        let town_named_like_canton = vec![locality("Aargau"), admin_area("Solothurn", Some("SO"))];
        let missing = vec![locality("Baden")];

        // Act & Assert
        assert!(region.matches(&inside));
        assert!(!region.matches(&town_named_like_canton));
        assert!(!region.matches(&missing));
        assert!(!region.matches(&[]));
    }

    #[test]
    fn matches_on_short_name_and_localized_names() {
        let region = Region::new("Zurich");
        assert!(region.matches(&[admin_area("Zürich", None)]));
        assert!(region.matches(&[admin_area("Zurigo", None)]));
        assert!(region.matches(&[admin_area("Kanton Zürich", Some("ZH"))]));
        assert!(region.matches(&[admin_area("Something odd", Some("ZH"))]));
    }

    #[test]
    fn unknown_region_matches_itself() {
        let region = Region::new("Vorarlberg");
        assert_eq!(region.name(), "Vorarlberg");
        assert!(region.matches(&[admin_area("vorarlberg", None)]));
        assert!(!region.matches(&[admin_area("Tirol", None)]));
    }

    #[test]
    fn folder_names_are_path_safe() {
        assert_eq!(folder_name("Basel-Stadt"), "basel-stadt");
        assert_eq!(folder_name("St. Gallen"), "st-gallen");
        assert_eq!(folder_name("Graubünden"), "graubunden");
        assert_eq!(folder_name(""), "unknown");
    }
}

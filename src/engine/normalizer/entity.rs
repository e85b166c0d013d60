use once_cell::sync::Lazy;

use crate::domain::{EntityInfo, EntityType};

/// Acceptance floor for fuzzy matches.
const FUZZY_THRESHOLD: f64 = 0.70;

pub struct KnownEntity {
    pub key: &'static str,
    pub canonical_name: &'static str,
    pub entity_type: EntityType,
    pub category: &'static str,
    /// County code where applicable.
    pub code: Option<&'static str>,
}

macro_rules! county {
    ($key:literal, $name:literal, $code:literal) => {
        KnownEntity {
            key: $key,
            canonical_name: $name,
            entity_type: EntityType::County,
            category: "counties",
            code: Some($code),
        }
    };
}

macro_rules! ministry {
    ($key:literal, $name:literal) => {
        KnownEntity {
            key: $key,
            canonical_name: $name,
            entity_type: EntityType::Ministry,
            category: "ministries",
            code: None,
        }
    };
}

macro_rules! agency {
    ($key:literal, $name:literal) => {
        KnownEntity {
            key: $key,
            canonical_name: $name,
            entity_type: EntityType::Agency,
            category: "agencies",
            code: None,
        }
    };
}

/// The 47 counties plus the ministries and agencies that recur in budget and
/// audit documents.
pub static KNOWN_ENTITIES: Lazy<Vec<KnownEntity>> = Lazy::new(|| {
    vec![
        county!("mombasa", "Mombasa County", "001"),
        county!("kwale", "Kwale County", "002"),
        county!("kilifi", "Kilifi County", "003"),
        county!("tana river", "Tana River County", "004"),
        county!("lamu", "Lamu County", "005"),
        county!("taita taveta", "Taita Taveta County", "006"),
        county!("garissa", "Garissa County", "007"),
        county!("wajir", "Wajir County", "008"),
        county!("mandera", "Mandera County", "009"),
        county!("marsabit", "Marsabit County", "010"),
        county!("isiolo", "Isiolo County", "011"),
        county!("meru", "Meru County", "012"),
        county!("tharaka nithi", "Tharaka Nithi County", "013"),
        county!("embu", "Embu County", "014"),
        county!("kitui", "Kitui County", "015"),
        county!("machakos", "Machakos County", "016"),
        county!("makueni", "Makueni County", "017"),
        county!("nyandarua", "Nyandarua County", "018"),
        county!("nyeri", "Nyeri County", "019"),
        county!("kirinyaga", "Kirinyaga County", "020"),
        county!("muranga", "Muranga County", "021"),
        county!("kiambu", "Kiambu County", "022"),
        county!("turkana", "Turkana County", "023"),
        county!("west pokot", "West Pokot County", "024"),
        county!("samburu", "Samburu County", "025"),
        county!("trans nzoia", "Trans Nzoia County", "026"),
        county!("uasin gishu", "Uasin Gishu County", "027"),
        county!("elgeyo marakwet", "Elgeyo Marakwet County", "028"),
        county!("nandi", "Nandi County", "029"),
        county!("baringo", "Baringo County", "030"),
        county!("laikipia", "Laikipia County", "031"),
        county!("nakuru", "Nakuru County", "032"),
        county!("narok", "Narok County", "033"),
        county!("kajiado", "Kajiado County", "034"),
        county!("kericho", "Kericho County", "035"),
        county!("bomet", "Bomet County", "036"),
        county!("kakamega", "Kakamega County", "037"),
        county!("vihiga", "Vihiga County", "038"),
        county!("bungoma", "Bungoma County", "039"),
        county!("busia", "Busia County", "040"),
        county!("siaya", "Siaya County", "041"),
        county!("kisumu", "Kisumu County", "042"),
        county!("homa bay", "Homa Bay County", "043"),
        county!("migori", "Migori County", "044"),
        county!("kisii", "Kisii County", "045"),
        county!("nyamira", "Nyamira County", "046"),
        county!("nairobi", "Nairobi County", "047"),
        ministry!("health", "Ministry of Health"),
        ministry!("education", "Ministry of Education"),
        ministry!("treasury", "National Treasury"),
        ministry!("defense", "Ministry of Defense"),
        ministry!("interior", "Ministry of Interior and National Administration"),
        ministry!("transport", "Ministry of Transport and Infrastructure"),
        ministry!(
            "agriculture",
            "Ministry of Agriculture and Livestock Development"
        ),
        agency!("kra", "Kenya Revenue Authority"),
        agency!("kenha", "Kenya National Highways Authority"),
        agency!("nema", "National Environment Management Authority"),
    ]
});

/// County display names (without the "County" suffix) used by the audit
/// parser for title inference.
pub fn county_names() -> impl Iterator<Item = &'static str> {
    KNOWN_ENTITIES
        .iter()
        .filter(|e| e.entity_type == EntityType::County)
        .map(|e| e.canonical_name.trim_end_matches(" County"))
}

pub(super) fn normalize(raw: &str) -> Option<EntityInfo> {
    let cleaned = raw.trim().to_lowercase();
    if cleaned.is_empty() {
        return None;
    }

    // Exact key match wins outright.
    for known in KNOWN_ENTITIES.iter() {
        if known.key == cleaned {
            return Some(build(known, raw, 1.0));
        }
    }

    let mut best: Option<(&KnownEntity, f64)> = None;
    for known in KNOWN_ENTITIES.iter() {
        let score = token_ratio(&cleaned, &known.canonical_name.to_lowercase())
            .max(token_ratio(&cleaned, known.key));
        if score >= FUZZY_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
            best = Some((known, score));
        }
    }

    best.map(|(known, score)| build(known, raw, score))
}

fn build(known: &KnownEntity, raw: &str, confidence: f64) -> EntityInfo {
    let mut info = EntityInfo::new(known.canonical_name, known.entity_type)
        .with_confidence(confidence)
        .with_raw_name(raw.trim());
    info.category = Some(known.category.to_string());
    info
}

/// Token-sorted similarity ratio. Sorting the tokens first makes the score
/// insensitive to word order ("County of Nairobi" vs "Nairobi County").
fn token_ratio(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(&sort_tokens(a), &sort_tokens(b))
}

fn sort_tokens(s: &str) -> String {
    let mut tokens: Vec<&str> = s
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .collect();
    tokens.sort_unstable();
    tokens.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_is_full_confidence() {
        let info = normalize("nairobi").unwrap();
        assert_eq!(info.canonical_name, "Nairobi County");
        assert_eq!(info.entity_type, EntityType::County);
        assert_eq!(info.confidence, 1.0);
    }

    #[test]
    fn test_fuzzy_match_canonical_name() {
        let info = normalize("Ministry of Health").unwrap();
        assert_eq!(info.canonical_name, "Ministry of Health");
        assert!(info.confidence >= 0.70);
    }

    #[test]
    fn test_word_order_insensitive() {
        let info = normalize("County Nairobi").unwrap();
        assert_eq!(info.canonical_name, "Nairobi County");
    }

    #[test]
    fn test_unrelated_text_rejected() {
        assert!(normalize("completely unrelated text about weather").is_none());
        assert!(normalize("").is_none());
    }

    #[test]
    fn test_agency_abbreviation() {
        let info = normalize("KRA").unwrap();
        assert_eq!(info.canonical_name, "Kenya Revenue Authority");
    }

    #[test]
    fn test_forty_seven_counties() {
        assert_eq!(county_names().count(), 47);
    }
}

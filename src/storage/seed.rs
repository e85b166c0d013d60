//! Reference-data seeders, kept out of the ingestion hot path. Each seeder
//! is a thin pass over the loader's find-or-create helpers, so reruns are
//! no-ops.

use tracing::info;

use crate::domain::{EntityInfo, EntityType, NormalizedPeriod, Result};
use crate::engine::normalizer::KNOWN_ENTITIES;

use super::repository::Loader;

/// Cabinet-level ministries and state departments as currently constituted.
const MINISTRIES: [&str; 21] = [
    "Ministry of Interior and National Administration",
    "Ministry of Defence",
    "Ministry of Foreign and Diaspora Affairs",
    "National Treasury and Economic Planning",
    "Ministry of Education",
    "Ministry of Health",
    "Ministry of Agriculture and Livestock Development",
    "Ministry of Roads and Transport",
    "Ministry of Energy and Petroleum",
    "Ministry of Water, Sanitation and Irrigation",
    "Ministry of Environment, Climate Change and Forestry",
    "Ministry of Lands, Public Works, Housing and Urban Development",
    "Ministry of Information, Communications and the Digital Economy",
    "Ministry of Labour and Social Protection",
    "Ministry of Tourism and Wildlife",
    "Ministry of Youth Affairs, Sports and The Arts",
    "Ministry of East African Community, ASALs and Regional Development",
    "Ministry of Mining, Blue Economy and Maritime Affairs",
    "Ministry of Co-operatives and Micro, Small and Medium Enterprises (MSMEs)",
    "Ministry of Public Service, Gender and Affirmative Action",
    "The State Department for Correctional Services",
];

/// All 47 county governments.
pub async fn seed_counties(loader: &Loader) -> Result<usize> {
    let mut seeded = 0;
    for known in KNOWN_ENTITIES
        .iter()
        .filter(|e| e.entity_type == EntityType::County)
    {
        let info = EntityInfo::new(known.canonical_name, EntityType::County);
        loader.ensure_entity(&info).await?;
        seeded += 1;
    }
    info!(seeded, "county entities ensured");
    Ok(seeded)
}

pub async fn seed_ministries(loader: &Loader) -> Result<usize> {
    let mut seeded = 0;
    for name in MINISTRIES {
        let info = EntityInfo::new(name, EntityType::Ministry);
        loader.ensure_entity(&info).await?;
        seeded += 1;
    }
    info!(seeded, "ministry entities ensured");
    Ok(seeded)
}

/// Minimum viable reference data: the country row, the national entity, a
/// handful of anchor entities and the current fiscal period.
pub async fn seed_minimums(loader: &Loader) -> Result<()> {
    loader.ensure_country().await?;
    loader.ensure_entity(&EntityInfo::national()).await?;

    for (name, entity_type) in [
        ("Ministry of Health", EntityType::Ministry),
        ("Ministry of Education", EntityType::Ministry),
        ("Nairobi County", EntityType::County),
        ("Mombasa County", EntityType::County),
    ] {
        loader.ensure_entity(&EntityInfo::new(name, entity_type)).await?;
    }

    let now = chrono::Utc::now().date_naive();
    let start_year = if chrono::Datelike::month(&now) >= 7 {
        chrono::Datelike::year(&now)
    } else {
        chrono::Datelike::year(&now) - 1
    };
    loader
        .ensure_fiscal_period(&NormalizedPeriod::fiscal_year(start_year))
        .await?;

    info!("minimum reference data ensured");
    Ok(())
}

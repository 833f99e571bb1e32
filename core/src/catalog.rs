// Copyright 2025 HEM Sp. z o.o.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::collections::HashSet;

use serde::Deserialize;

use crate::definitions::{Region, StreamDescriptor};
use crate::errors::CatalogError;

/// Read-only mapping of region to ordered streams.
///
/// Region declaration order is preserved; it is the order other regions are
/// borrowed from when a pool is topped up. The `Global` list is derived once at
/// construction as the id-deduplicated concatenation of every declared region.
#[derive(Debug, Clone)]
pub struct RegionCatalog {
    regions: Vec<(Region, Vec<StreamDescriptor>)>,
    global: Vec<StreamDescriptor>,
}

#[derive(Deserialize)]
struct CatalogDocument {
    regions: Vec<RegionEntry>,
}

#[derive(Deserialize)]
struct RegionEntry {
    region: Region,
    streams: Vec<StreamEntry>,
}

#[derive(Deserialize)]
struct StreamEntry {
    id: String,
    display_name: String,
    source_locator: String,
}

impl RegionCatalog {
    pub fn new(regions: Vec<(Region, Vec<StreamDescriptor>)>) -> Result<Self, CatalogError> {
        if regions.is_empty() {
            return Err(CatalogError::NoRegions);
        }

        let mut declared = HashSet::new();
        for (region, streams) in &regions {
            if *region == Region::Global {
                return Err(CatalogError::GlobalDeclared);
            }
            if !declared.insert(*region) {
                return Err(CatalogError::DuplicateRegion(*region));
            }
            if streams.is_empty() {
                return Err(CatalogError::EmptyRegion(*region));
            }
            if let Some(stray) = streams.iter().find(|s| s.region != *region) {
                return Err(CatalogError::RegionMismatch {
                    id: stray.id.clone(),
                    declared: *region,
                    actual: stray.region,
                });
            }
        }

        let global = dedup_by_id(regions.iter().flat_map(|(_, streams)| streams.iter()));
        Ok(Self { regions, global })
    }

    /// Parses a catalog document of the form
    /// `{"regions": [{"region": "europe", "streams": [{"id", "display_name", "source_locator"}]}]}`.
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDocument = serde_json::from_str(json)?;
        let regions = doc
            .regions
            .into_iter()
            .map(|entry| {
                let region = entry.region;
                let streams = entry
                    .streams
                    .into_iter()
                    .map(|s| StreamDescriptor::new(s.id, s.display_name, s.source_locator, region))
                    .collect();
                (region, streams)
            })
            .collect();
        Self::new(regions)
    }

    /// Streams of a region in cycling order. `Global` yields every stream.
    /// A region the catalog does not declare yields an empty slice; the pool
    /// resolver fills such regions entirely by borrowing.
    pub fn streams_for(&self, region: Region) -> &[StreamDescriptor] {
        if region == Region::Global {
            return &self.global;
        }
        self.regions
            .iter()
            .find(|(r, _)| *r == region)
            .map(|(_, streams)| streams.as_slice())
            .unwrap_or(&[])
    }

    /// Declared regions in declaration order (never includes `Global`).
    pub fn regions(&self) -> impl Iterator<Item = Region> + '_ {
        self.regions.iter().map(|(r, _)| *r)
    }

    pub fn contains(&self, region: Region) -> bool {
        region == Region::Global || self.regions.iter().any(|(r, _)| *r == region)
    }

    pub fn get(&self, id: &str) -> Option<&StreamDescriptor> {
        self.global.iter().find(|s| s.id == id)
    }

    /// Number of distinct streams across the whole catalog.
    pub fn distinct_len(&self) -> usize {
        self.global.len()
    }

    /// Default 24/7 news channel line-up.
    pub fn builtin() -> Self {
        fn yt(id: &str, name: &str, video: &str, region: Region) -> StreamDescriptor {
            StreamDescriptor::new(id, name, format!("https://www.youtube.com/embed/{}?autoplay=1&mute=1", video), region)
        }
        fn channel(id: &str, name: &str, channel: &str, region: Region) -> StreamDescriptor {
            StreamDescriptor::new(
                id,
                name,
                format!("https://www.youtube.com/embed/live_stream?channel={}&autoplay=1&mute=1", channel),
                region,
            )
        }

        let regions = vec![
            (Region::MiddleEast, vec![
                yt("aljazeera", "Al Jazeera EN", "gCNeDWCI0vo", Region::MiddleEast),
                yt("trt", "TRT World", "CV5Fooi8YJE", Region::MiddleEast),
            ]),
            (Region::Europe, vec![
                yt("france24", "France 24 EN", "h3MuIUNCCzI", Region::Europe),
                yt("sky", "Sky News", "9Auq9mYxFEE", Region::Europe),
                yt("euronews", "Euronews", "pykpO5kQJ98", Region::Europe),
                yt("dw", "DW News", "pqabxBKzZ6M", Region::Europe),
            ]),
            (Region::Asia, vec![
                channel("wion", "WION", "UC_gUM8rL-Lrg6O3adPW9K1g", Region::Asia),
                yt("cgtn", "CGTN", "ELw3gdFp5k8", Region::Asia),
                yt("nhk", "NHK World", "f0lYkdA-Gtw", Region::Asia),
                yt("arirang", "Arirang TV", "KXI5DOjUKOk", Region::Asia),
                yt("indiatoday", "India Today", "Nq2wYlWFucg", Region::Asia),
                channel("cna", "CNA", "UCo8bcnLyZH8tBIH9V1mLgqQ", Region::Asia),
                channel("ndtv", "NDTV 24x7", "UCttspZesZIDEwwpVIgoZtWQ", Region::Asia),
            ]),
            (Region::Africa, vec![
                yt("africanews", "Africanews", "NkX1LEmXfec", Region::Africa),
            ]),
            (Region::Oceania, vec![
                channel("abc-au", "ABC News AU", "UCVgO39Bk5sMo66-6o6Spn6Q", Region::Oceania),
            ]),
        ];

        Self::new(regions).expect("builtin catalog is well formed")
    }
}

pub(crate) fn dedup_by_id<'a>(streams: impl IntoIterator<Item = &'a StreamDescriptor>) -> Vec<StreamDescriptor> {
    let mut seen = HashSet::new();
    streams
        .into_iter()
        .filter(|s| seen.insert(s.id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(id: &str, region: Region) -> StreamDescriptor {
        StreamDescriptor::new(id, id.to_uppercase(), format!("https://example.invalid/{}", id), region)
    }

    #[test]
    fn global_is_deduplicated_concatenation_in_first_seen_order() {
        let mut shared = s("b", Region::Asia);
        shared.display_name = "shared".into();
        let catalog = RegionCatalog::new(vec![
            (Region::Europe, vec![s("a", Region::Europe), s("b", Region::Europe)]),
            (Region::Asia, vec![s("c", Region::Asia), shared]),
        ])
        .unwrap();

        let ids: Vec<_> = catalog.streams_for(Region::Global).iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
        assert_eq!(catalog.distinct_len(), 3);
    }

    #[test]
    fn undeclared_region_yields_empty_slice() {
        let catalog = RegionCatalog::new(vec![(Region::Europe, vec![s("a", Region::Europe)])]).unwrap();
        assert!(catalog.streams_for(Region::Africa).is_empty());
        assert!(!catalog.contains(Region::Africa));
        assert!(catalog.contains(Region::Global));
    }

    #[test]
    fn rejects_malformed_catalogs() {
        assert!(matches!(RegionCatalog::new(vec![]), Err(CatalogError::NoRegions)));
        assert!(matches!(
            RegionCatalog::new(vec![(Region::Asia, vec![])]),
            Err(CatalogError::EmptyRegion(Region::Asia))
        ));
        assert!(matches!(
            RegionCatalog::new(vec![(Region::Global, vec![s("a", Region::Global)])]),
            Err(CatalogError::GlobalDeclared)
        ));
        assert!(matches!(
            RegionCatalog::new(vec![
                (Region::Asia, vec![s("a", Region::Asia)]),
                (Region::Asia, vec![s("b", Region::Asia)]),
            ]),
            Err(CatalogError::DuplicateRegion(Region::Asia))
        ));
        assert!(matches!(
            RegionCatalog::new(vec![(Region::Asia, vec![s("a", Region::Europe)])]),
            Err(CatalogError::RegionMismatch { .. })
        ));
    }

    #[test]
    fn parses_json_document() {
        let json = r#"{
            "regions": [
                {"region": "europe", "streams": [
                    {"id": "dw", "display_name": "DW News", "source_locator": "pqabxBKzZ6M"}
                ]},
                {"region": "middle-east", "streams": [
                    {"id": "trt", "display_name": "TRT World", "source_locator": "CV5Fooi8YJE"}
                ]}
            ]
        }"#;
        let catalog = RegionCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.regions().collect::<Vec<_>>(), [Region::Europe, Region::MiddleEast]);
        assert_eq!(catalog.get("trt").unwrap().region, Region::MiddleEast);
    }

    #[test]
    fn json_with_empty_region_is_a_configuration_error() {
        let json = r#"{"regions": [{"region": "asia", "streams": []}]}"#;
        assert!(matches!(RegionCatalog::from_json_str(json), Err(CatalogError::EmptyRegion(Region::Asia))));
        assert!(matches!(RegionCatalog::from_json_str("{"), Err(CatalogError::Parse(_))));
    }

    #[test]
    fn builtin_catalog_covers_every_declared_region() {
        let catalog = RegionCatalog::builtin();
        for region in catalog.regions() {
            assert!(!catalog.streams_for(region).is_empty());
        }
        assert!(catalog.distinct_len() >= 4);
    }
}

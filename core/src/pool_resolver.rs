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

use crate::catalog::{dedup_by_id, RegionCatalog};
use crate::definitions::{Region, StreamDescriptor};

/// Computes the candidate pool a slot cycles through for `region`.
///
/// The region's own streams come first, deduplicated by id. When the region is
/// not `Global` and has fewer than `minimum_size` streams, streams of the other
/// declared regions are appended in declaration order, skipping known ids,
/// until the pool is large enough or the catalog runs out. The result can be
/// shorter than `minimum_size`; callers wrap their cursor modulo its length.
pub fn resolve_pool(catalog: &RegionCatalog, region: Region, minimum_size: usize) -> Vec<StreamDescriptor> {
    let mut pool = dedup_by_id(catalog.streams_for(region));
    if region == Region::Global || pool.len() >= minimum_size {
        return pool;
    }

    let mut seen: HashSet<String> = pool.iter().map(|s| s.id.clone()).collect();
    'borrow: for other in catalog.regions().filter(|r| *r != region) {
        for stream in catalog.streams_for(other) {
            if pool.len() >= minimum_size {
                break 'borrow;
            }
            if seen.insert(stream.id.clone()) {
                pool.push(stream.clone());
            }
        }
    }
    pool
}

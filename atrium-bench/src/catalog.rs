// Copyright 2026 atrium Project Authors
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

use std::{
    collections::BTreeMap,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
    time::Duration,
};

use atrium::{Error, Result, Source};
use serde::{Deserialize, Serialize};

/// A product record served by the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub product_id: u64,
    pub name: String,
    pub description: String,
    pub image: Vec<u8>,
    pub comments: Vec<String>,
}

impl ProductDetails {
    fn sample(product_id: u64) -> Self {
        Self {
            product_id,
            name: "Awesome product".to_string(),
            description: "Better yet get it I tell ya!".to_string(),
            image: vec![],
            comments: vec![
                "Used it once and I'm rich and happy!".to_string(),
                "My wife came back!".to_string(),
                "I'm literally back to life omg".to_string(),
                "Guys I can backflip now".to_string(),
            ],
        }
    }
}

/// An in-memory product catalog that emulates a slow database.
#[derive(Debug)]
pub struct CatalogStub {
    products: BTreeMap<u64, ProductDetails>,
    latency: Duration,
    fetches: AtomicUsize,
}

impl CatalogStub {
    /// Create a catalog holding `count` products starting at id `start`.
    pub fn new(start: u64, count: u64, latency: Duration) -> Self {
        let products = (start..start + count)
            .map(|id| (id, ProductDetails::sample(id)))
            .collect();
        Self {
            products,
            latency,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of fetches issued against the catalog, failed ones included.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

impl Source for CatalogStub {
    type Key = u64;
    type Value = ProductDetails;

    fn fetch(&self, key: &u64) -> Result<ProductDetails> {
        self.fetches.fetch_add(1, Ordering::Relaxed);

        // Unknown ids fail fast, only lookups of existing rows pay the latency.
        let product = self.products.get(key).ok_or_else(|| Error::not_found(key))?;
        thread::sleep(self.latency);

        tracing::trace!(product_id = key, "[catalog]: fetched");
        Ok(product.clone())
    }

    fn list_keys(&self) -> Vec<u64> {
        self.products.keys().copied().collect()
    }
}

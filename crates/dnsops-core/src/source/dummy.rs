//! A source that provides generated endpoints for testing and dry-running
//! providers.

use crate::endpoint::{Endpoint, RecordType};
use crate::error::Result;
use crate::traits::Source;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

const DEFAULT_FQDN_TEMPLATE: &str = "example.com";
const HOST_PREFIX: &str = "dummy-";
const ENDPOINTS_PER_NAME: usize = 5;

/// Produces a handful of random `dummy-*` A records under each configured
/// parent name.
///
/// Randomness is seeded per instance so tests can pin the generated set.
pub struct DummySource {
    dns_names: Vec<String>,
    rng: Mutex<StdRng>,
}

impl DummySource {
    /// Creates a dummy source over the comma-separated parent names in
    /// `fqdn_template`; an empty template falls back to `example.com`.
    pub fn new(fqdn_template: &str) -> Self {
        Self::with_seed(fqdn_template, rand::random())
    }

    /// Same as [`new`](Self::new) with a fixed seed.
    pub fn with_seed(fqdn_template: &str, seed: u64) -> Self {
        let dns_names = if fqdn_template.is_empty() {
            vec![DEFAULT_FQDN_TEMPLATE.to_string()]
        } else {
            fqdn_template
                .replace(' ', "")
                .split(',')
                .map(str::to_string)
                .filter(|s| !s.is_empty())
                .collect()
        };

        Self {
            dns_names,
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn generate_endpoint(&self, dns_name: &str) -> Endpoint {
        let mut rng = self.rng.lock().unwrap();
        let prefix: String = (0..4)
            .map(|_| rng.gen_range(b'a'..=b'z') as char)
            .collect();
        // 192.0.2.0/24 is reserved by RFC 5737 for documentation and
        // examples.
        let target = format!("192.0.2.{}", rng.gen_range(1..=253));
        Endpoint::new(
            &format!("{HOST_PREFIX}{prefix}.{dns_name}"),
            RecordType::A,
            [target.as_str()],
        )
    }
}

#[async_trait]
impl Source for DummySource {
    async fn endpoints(&self) -> Result<Vec<Endpoint>> {
        let mut endpoints = Vec::new();
        for name in &self.dns_names {
            for _ in 0..ENDPOINTS_PER_NAME {
                endpoints.push(self.generate_endpoint(name));
            }
        }
        Ok(endpoints)
    }
}

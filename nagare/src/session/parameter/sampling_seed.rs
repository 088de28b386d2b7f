use rand::prelude::*;

use crate::session::parameter::ResolvableValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingSeed {
    Default,
    Custom(u64),
}

impl SamplingSeed {
    /// Negative seeds request a random one, as in `generation_config.json`
    /// files that use `-1`.
    pub fn from_signed(seed: i64) -> Self {
        match u64::try_from(seed) {
            Ok(seed) => SamplingSeed::Custom(seed),
            Err(_) => SamplingSeed::Default,
        }
    }
}

impl Default for SamplingSeed {
    fn default() -> Self {
        SamplingSeed::Default
    }
}

impl ResolvableValue<u64> for SamplingSeed {
    fn resolve(&self) -> u64 {
        match self {
            SamplingSeed::Default => rand::rng().random::<u64>(),
            SamplingSeed::Custom(seed) => *seed,
        }
    }
}

//! Fuzz target for listing configuration and schema parsing.
//!
//! Arbitrary TOML is fed to the catalog and schema parsers, which must
//! return errors rather than panic.
//!
//! Run with:
//! ```bash
//! cargo +nightly fuzz run fuzz_listing_config
//! ```

#![no_main]

use basequery_engine::{ListingCatalog, ListingConfig, Schema};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        let _ = ListingCatalog::from_toml_str(input);
        let _ = ListingConfig::from_toml_str(input);
        let _ = Schema::from_toml_str(input);
    }
});

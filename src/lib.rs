//! iXhash fuzzy digests of e-mail bodies and DNS list lookups.
//!
//! [`all`] computes the three digests of a body; [`ReputationChecker`]
//! queries `<digest>.<zone>` to see whether a list knows them.

pub mod charclass;
pub mod config;
pub mod digest;
pub mod milter;
pub mod reputation;
pub mod squeeze;
pub mod stages;

pub use charclass::CharClass;
pub use config::Config;
pub use digest::{all, all_optional, first_hash, second_hash, third_hash, DigestTriple, Stage};
pub use milter::Milter;
pub use reputation::{
    lookup_host, HostResolver, ListingResult, LookupError, ReputationChecker, Resolution,
    SystemResolver,
};

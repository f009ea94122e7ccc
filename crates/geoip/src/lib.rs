//! Region resolution for recorded clicks.
//!
//! A [`RegionResolver`] classifies the source address first: loopback and
//! private or reserved ranges map to fixed sentinels without leaving the
//! process. Only public addresses reach a [`GeoLookup`] backend, either the
//! ip-api HTTP endpoint ([`IpApiLookup`]) or a local MaxMind database
//! ([`MaxMindLookup`]), and every backend call is bounded by a timeout.
//! Resolution never fails; anything that goes wrong yields [`Region::Unknown`].

pub mod classify;
pub mod lookup;
pub mod mmdb;
pub mod region;
pub mod resolver;

pub use classify::{classify, AddressClass};
pub use lookup::{GeoLookup, IpApiLookup};
pub use mmdb::MaxMindLookup;
pub use region::Region;
pub use resolver::RegionResolver;

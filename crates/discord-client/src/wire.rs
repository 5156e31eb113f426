//! Serde helpers for the REST wire format.
//!
//! Discord encodes 64-bit identifiers and permission bitsets as decimal
//! strings; these helpers also accept plain numbers.

use serde::de::{self, Deserializer};
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum RawU64 {
    Str(String),
    Num(u64),
}

impl RawU64 {
    fn parse<E: de::Error>(self) -> Result<u64, E> {
        match self {
            RawU64::Num(n) => Ok(n),
            RawU64::Str(s) => s.parse().map_err(E::custom),
        }
    }
}

pub(crate) fn de_u64<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
    RawU64::deserialize(d)?.parse()
}

pub(crate) fn de_opt_u64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Option::<RawU64>::deserialize(d)?
        .map(RawU64::parse)
        .transpose()
}

pub(crate) fn de_u64_vec<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u64>, D::Error> {
    Vec::<RawU64>::deserialize(d)?
        .into_iter()
        .map(RawU64::parse)
        .collect()
}

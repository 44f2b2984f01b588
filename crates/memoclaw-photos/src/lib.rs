//! # MemoClaw Photos
//!
//! Read-only queries against an Immich server: memories for a date, the
//! people index, a person's assets, single-asset detail, and thumbnail
//! bytes — plus the date filtering, digest parsing, and person ranking
//! built on top of them. Nothing in this crate writes to the server.

pub mod immich;
pub mod memories;
pub mod persons;

pub use immich::{AssetDetail, AssetFace, ExifInfo, ImmichClient, SearchPage};
pub use memories::{
    Asset, AssetKind, MemoryDigest, RawAsset, RawMemory, YearBucket, filter_for_date,
    parse_memories,
};
pub use persons::{PersonRecord, RankedPerson, rank_top_persons};

//! Protobuf and gRPC types of the [Thanos](https://thanos.io) Store API.
//!
//! The types in [`storepb`] are generated from the `.proto` files under
//! `generate/proto` by the `store-api-generate` crate and committed, so that
//! building this crate needs neither `protoc` nor a build script.

pub use prost;
pub use prost_types;
pub use tonic;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod storepb;

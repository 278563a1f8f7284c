//! Protocol Buffer definitions and generated code for the registry RPC
//! service.
//!
//! This module contains auto-generated Rust types from Protobuf definitions,
//! created by [`tonic-build`] from `proto/registry.proto`.

pub mod registry {
    tonic::include_proto!("registry");
}

// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for discovery, client creation, management API access and pod exec.

pub mod client;
pub mod discovery;
pub mod exec;
pub mod management;
pub mod namespaces;
pub mod objects;

pub use client::create_client;
pub use discovery::{list_in, list_objects, ResourceCatalog, ResourceTypeDescriptor};
pub use management::ManagementClient;
pub use namespaces::delete_namespace;
pub use objects::LiveObject;

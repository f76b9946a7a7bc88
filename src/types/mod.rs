// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Typed resources of the management API.

pub mod management;

pub use management::{
    Aggregate, Cluster, ClusterSpec, Node, NodeSpec, Project, ProjectSpec, User, UserSpec,
};

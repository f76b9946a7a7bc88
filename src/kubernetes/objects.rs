// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Generic view over objects of any resource type.

use kube::api::{DynamicObject, ObjectMeta};
use kube::ResourceExt;
use std::fmt;

/// An object of an arbitrary resource type.
///
/// Exposes the metadata teardown works with; everything else is carried
/// through untouched so a replace writes back exactly what was read.
#[derive(Clone, Debug)]
pub struct LiveObject {
    inner: DynamicObject,
}

impl LiveObject {
    pub fn name(&self) -> String {
        self.inner.name_any()
    }

    pub fn namespace(&self) -> Option<String> {
        self.inner.namespace()
    }

    pub fn meta(&self) -> &ObjectMeta {
        &self.inner.metadata
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.inner.metadata
    }

    pub fn as_dynamic(&self) -> &DynamicObject {
        &self.inner
    }
}

impl From<DynamicObject> for LiveObject {
    fn from(inner: DynamicObject) -> Self {
        Self { inner }
    }
}

impl fmt::Display for LiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.namespace() {
            Some(ns) => write!(f, "{}/{}", ns, self.name()),
            None => write!(f, "{}", self.name()),
        }
    }
}

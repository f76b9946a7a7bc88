// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! In-memory Kubernetes API server for tests.
//!
//! [`FakeCluster`] is a tower `Service` a `kube::Client` can be built on. It
//! serves discovery documents and keeps objects per resource type, honouring
//! label selectors, resource versions, finalizers and namespace deletion.

use http::{Method, Request, Response};
use http_body_util::BodyExt;
use kube::client::Body;
use kube::Client;
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

const DELETION_TIMESTAMP: &str = "2026-01-01T00:00:00Z";

/// A resource type the fake cluster serves
#[derive(Debug, Clone)]
pub struct ServedType {
    pub group: String,
    pub version: String,
    pub kind: String,
    pub plural: String,
    pub namespaced: bool,
}

impl ServedType {
    fn new(group: &str, version: &str, kind: &str, plural: &str, namespaced: bool) -> Self {
        Self {
            group: group.to_string(),
            version: version.to_string(),
            kind: kind.to_string(),
            plural: plural.to_string(),
            namespaced,
        }
    }

    fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

/// A delete request that reached an existing object
#[derive(Debug, Clone)]
pub struct DeleteRecord {
    pub group: String,
    pub plural: String,
    pub namespace: Option<String>,
    pub name: String,
    pub propagation_policy: Option<String>,
    pub grace_period_seconds: Option<i64>,
}

/// (group, plural, namespace or empty, name)
type ObjectKey = (String, String, String, String);

#[derive(Default)]
struct State {
    types: Vec<ServedType>,
    objects: BTreeMap<ObjectKey, Value>,
    resource_version: u64,
    uid: u64,
    conflicts: HashMap<(String, String), u32>,
    list_failures: HashMap<(String, String), u16>,
    discovery_failures: HashMap<String, u16>,
    requests: Vec<(String, String)>,
    deletes: Vec<DeleteRecord>,
    violations: Vec<String>,
    nodes: Vec<String>,
    daemonsets_ready: bool,
}

/// A stateful fake API server
#[derive(Clone)]
pub struct FakeCluster {
    state: Arc<Mutex<State>>,
}

impl FakeCluster {
    /// A cluster serving the built-in types used by teardown and the collectors
    pub fn new() -> Self {
        let state = State {
            types: vec![
                ServedType::new("", "v1", "Namespace", "namespaces", false),
                ServedType::new("", "v1", "Secret", "secrets", true),
                ServedType::new("", "v1", "ConfigMap", "configmaps", true),
                ServedType::new("", "v1", "Pod", "pods", true),
                ServedType::new("", "v1", "Node", "nodes", false),
                ServedType::new("apps", "v1", "Deployment", "deployments", true),
                ServedType::new("apps", "v1", "DaemonSet", "daemonsets", true),
                ServedType::new(
                    "rbac.authorization.k8s.io",
                    "v1",
                    "ClusterRole",
                    "clusterroles",
                    false,
                ),
                ServedType::new(
                    "rbac.authorization.k8s.io",
                    "v1",
                    "ClusterRoleBinding",
                    "clusterrolebindings",
                    false,
                ),
                ServedType::new(
                    "apiextensions.k8s.io",
                    "v1",
                    "CustomResourceDefinition",
                    "customresourcedefinitions",
                    false,
                ),
            ],
            nodes: vec!["node-1".to_string()],
            daemonsets_ready: true,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Serve the management aggregates and their definitions
    pub fn with_management_types(self) -> Self {
        self.serve_custom("management.cattle.io", "v3", "Project", "projects", true);
        self.serve_custom("management.cattle.io", "v3", "Cluster", "clusters", false);
        self.serve_custom("management.cattle.io", "v3", "User", "users", false);
        self.serve_custom("management.cattle.io", "v3", "Node", "nodes", true);
        self
    }

    /// Serve a custom type and store its definition
    pub fn serve_custom(
        &self,
        group: &str,
        version: &str,
        kind: &str,
        plural: &str,
        namespaced: bool,
    ) {
        let scope = if namespaced { "Namespaced" } else { "Cluster" };
        self.state
            .lock()
            .unwrap()
            .types
            .push(ServedType::new(group, version, kind, plural, namespaced));
        self.insert(json!({
            "apiVersion": "apiextensions.k8s.io/v1",
            "kind": "CustomResourceDefinition",
            "metadata": { "name": format!("{}.{}", plural, group) },
            "spec": {
                "group": group,
                "names": { "kind": kind, "plural": plural },
                "scope": scope,
                "versions": [{ "name": version, "served": true, "storage": true }]
            }
        }));
    }

    pub fn with_nodes(self, nodes: &[&str]) -> Self {
        self.state.lock().unwrap().nodes = nodes.iter().map(|n| n.to_string()).collect();
        self
    }

    /// Make created daemon sets report no ready replicas
    pub fn with_unready_daemonsets(self) -> Self {
        self.state.lock().unwrap().daemonsets_ready = false;
        self
    }

    /// Store an object, assigning a uid and resource version when missing
    pub fn insert(&self, mut object: Value) -> Value {
        let mut state = self.state.lock().unwrap();
        let api_version = str_of(&object["apiVersion"]).to_string();
        let kind = str_of(&object["kind"]).to_string();
        let served = state
            .types
            .iter()
            .find(|t| t.api_version() == api_version && t.kind == kind)
            .cloned()
            .unwrap_or_else(|| panic!("{} {} is not served", api_version, kind));

        let uid = state.next_uid();
        let rv = state.next_resource_version();
        let meta = metadata_mut(&mut object);
        meta.entry("uid").or_insert(json!(uid));
        meta.insert("resourceVersion".to_string(), json!(rv));

        let key = key_of(&served, &object);
        state.objects.insert(key, object.clone());
        object
    }

    /// Fail list calls for a type with the given status code
    pub fn fail_list(&self, group: &str, plural: &str, code: u16) {
        self.state
            .lock()
            .unwrap()
            .list_failures
            .insert((group.to_string(), plural.to_string()), code);
    }

    /// Fail the resource list of a group version (`v1` for the core group)
    pub fn fail_discovery(&self, group_version: &str, code: u16) {
        self.state
            .lock()
            .unwrap()
            .discovery_failures
            .insert(group_version.to_string(), code);
    }

    /// Answer the next `times` writes to an object with a conflict
    pub fn inject_conflicts(&self, plural: &str, name: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .conflicts
            .insert((plural.to_string(), name.to_string()), times);
    }

    pub fn client(&self) -> Client {
        Client::new(self.clone(), "default")
    }

    pub fn get(
        &self,
        group: &str,
        plural: &str,
        namespace: Option<&str>,
        name: &str,
    ) -> Option<Value> {
        let key = (
            group.to_string(),
            plural.to_string(),
            namespace.unwrap_or_default().to_string(),
            name.to_string(),
        );
        self.state.lock().unwrap().objects.get(&key).cloned()
    }

    pub fn exists(&self, group: &str, plural: &str, namespace: Option<&str>, name: &str) -> bool {
        self.get(group, plural, namespace, name).is_some()
    }

    /// Every stored object
    pub fn objects(&self) -> Vec<Value> {
        self.state
            .lock()
            .unwrap()
            .objects
            .values()
            .cloned()
            .collect()
    }

    pub fn count(&self, group: &str, plural: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .objects
            .keys()
            .filter(|k| k.0 == group && k.1 == plural)
            .count()
    }

    pub fn is_served(&self, group: &str, plural: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .types
            .iter()
            .any(|t| t.group == group && t.plural == plural)
    }

    pub fn deletes(&self) -> Vec<DeleteRecord> {
        self.state.lock().unwrap().deletes.clone()
    }

    /// Position of the first delete of an object in the delete log
    pub fn delete_index(&self, plural: &str, name: &str) -> Option<usize> {
        self.deletes()
            .iter()
            .position(|d| d.plural == plural && d.name == name)
    }

    /// Namespace deletions that removed objects still carrying installation finalizers
    pub fn violations(&self) -> Vec<String> {
        self.state.lock().unwrap().violations.clone()
    }

    /// (method, path) of every request served
    pub fn requests(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn write_count(&self) -> usize {
        self.requests()
            .iter()
            .filter(|(method, _)| method == "PUT" || method == "POST" || method == "DELETE")
            .count()
    }
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<Request<Body>> for FakeCluster {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let state = self.state.clone();

        Box::pin(async move {
            let (parts, body) = req.into_parts();
            let body = body.collect().await?.to_bytes();
            let body: Value = if body.is_empty() {
                Value::Null
            } else {
                serde_json::from_slice(&body)?
            };

            let (status, response) = state.lock().unwrap().handle(
                &parts.method,
                parts.uri.path(),
                parts.uri.query(),
                body,
            );

            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(response.to_string().into_bytes()))
                .unwrap())
        })
    }
}

impl State {
    fn next_uid(&mut self) -> String {
        self.uid += 1;
        format!("uid-{}", self.uid)
    }

    fn next_resource_version(&mut self) -> String {
        self.resource_version += 1;
        self.resource_version.to_string()
    }

    fn handle(
        &mut self,
        method: &Method,
        path: &str,
        query: Option<&str>,
        body: Value,
    ) -> (u16, Value) {
        self.requests.push((method.to_string(), path.to_string()));

        let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
        let (group, version, rest) = match segments.as_slice() {
            ["api"] => return (200, self.core_versions()),
            ["apis"] => return (200, self.group_list()),
            ["api", version, rest @ ..] => ("", *version, rest),
            ["apis", group, version, rest @ ..] => (*group, *version, rest),
            _ => return not_found("the server could not find the requested resource"),
        };

        if rest.is_empty() {
            return self.resource_list(group, version);
        }

        let (namespace, plural, name) = match rest {
            ["namespaces", ns, plural, tail @ ..] => (Some(ns.to_string()), *plural, tail.first()),
            [plural, tail @ ..] => (None, *plural, tail.first()),
            [] => return not_found("the server could not find the requested resource"),
        };
        let Some(served) = self
            .types
            .iter()
            .find(|t| t.group == group && t.version == version && t.plural == plural)
            .cloned()
        else {
            return not_found("the server could not find the requested resource");
        };
        let name = name.map(|n| n.to_string());

        match (method.as_str(), name) {
            ("GET", None) => self.list(&served, namespace.as_deref(), query),
            ("GET", Some(name)) => self.get(&served, namespace.as_deref(), &name),
            ("POST", None) => self.create(&served, namespace.as_deref(), body),
            ("PUT", Some(name)) => self.replace(&served, namespace.as_deref(), &name, body),
            ("DELETE", Some(name)) => self.delete(&served, namespace.as_deref(), &name, body),
            _ => status(405, "MethodNotAllowed", "method not allowed"),
        }
    }

    fn core_versions(&self) -> Value {
        json!({
            "kind": "APIVersions",
            "apiVersion": "v1",
            "versions": ["v1"],
            "serverAddressByClientCIDRs": []
        })
    }

    fn group_list(&self) -> Value {
        let mut groups: Vec<Value> = Vec::new();
        let mut seen = Vec::new();
        for t in self.types.iter().filter(|t| !t.group.is_empty()) {
            if seen.contains(&t.group) {
                continue;
            }
            seen.push(t.group.clone());
            let version = json!({ "groupVersion": t.api_version(), "version": t.version });
            groups.push(json!({
                "name": t.group,
                "versions": [version.clone()],
                "preferredVersion": version
            }));
        }
        json!({ "kind": "APIGroupList", "apiVersion": "v1", "groups": groups })
    }

    fn resource_list(&self, group: &str, version: &str) -> (u16, Value) {
        let group_version = if group.is_empty() {
            version.to_string()
        } else {
            format!("{}/{}", group, version)
        };
        if let Some(code) = self.discovery_failures.get(&group_version) {
            return unavailable(*code);
        }

        let mut resources = Vec::new();
        for t in self
            .types
            .iter()
            .filter(|t| t.group == group && t.version == version)
        {
            resources.push(json!({
                "name": t.plural,
                "singularName": "",
                "namespaced": t.namespaced,
                "kind": t.kind,
                "verbs": ["create", "delete", "get", "list", "patch", "update", "watch"]
            }));
            resources.push(json!({
                "name": format!("{}/status", t.plural),
                "singularName": "",
                "namespaced": t.namespaced,
                "kind": t.kind,
                "verbs": ["get", "patch", "update"]
            }));
        }
        if resources.is_empty() {
            return not_found("the server could not find the requested resource");
        }

        (
            200,
            json!({
                "kind": "APIResourceList",
                "apiVersion": "v1",
                "groupVersion": group_version,
                "resources": resources
            }),
        )
    }

    fn list(
        &self,
        served: &ServedType,
        namespace: Option<&str>,
        query: Option<&str>,
    ) -> (u16, Value) {
        if let Some(code) = self
            .list_failures
            .get(&(served.group.clone(), served.plural.clone()))
        {
            return unavailable(*code);
        }

        let selector = query
            .map(|q| {
                url::form_urlencoded::parse(q.as_bytes())
                    .find(|(k, _)| k == "labelSelector")
                    .map(|(_, v)| v.into_owned())
                    .unwrap_or_default()
            })
            .unwrap_or_default();

        let items: Vec<Value> = self
            .objects
            .iter()
            .filter(|(k, _)| k.0 == served.group && k.1 == served.plural)
            .filter(|(k, _)| namespace.map_or(true, |ns| k.2 == ns))
            .filter(|(_, v)| selector_matches(&selector, v))
            .map(|(_, v)| v.clone())
            .collect();

        (
            200,
            json!({
                "apiVersion": served.api_version(),
                "kind": format!("{}List", served.kind),
                "metadata": { "resourceVersion": self.resource_version.to_string() },
                "items": items
            }),
        )
    }

    fn key(&self, served: &ServedType, namespace: Option<&str>, name: &str) -> ObjectKey {
        let namespace = if served.namespaced {
            namespace.unwrap_or_default()
        } else {
            ""
        };
        (
            served.group.clone(),
            served.plural.clone(),
            namespace.to_string(),
            name.to_string(),
        )
    }

    fn get(&self, served: &ServedType, namespace: Option<&str>, name: &str) -> (u16, Value) {
        match self.objects.get(&self.key(served, namespace, name)) {
            Some(object) => (200, object.clone()),
            None => not_found(&format!("{} \"{}\" not found", served.plural, name)),
        }
    }

    fn take_conflict(&mut self, served: &ServedType, name: &str) -> bool {
        match self
            .conflicts
            .get_mut(&(served.plural.clone(), name.to_string()))
        {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn create(
        &mut self,
        served: &ServedType,
        namespace: Option<&str>,
        mut body: Value,
    ) -> (u16, Value) {
        let name = str_of(&body["metadata"]["name"]).to_string();
        let key = self.key(served, namespace, &name);
        if self.objects.contains_key(&key) {
            return status(
                409,
                "AlreadyExists",
                &format!("{} \"{}\" already exists", served.plural, name),
            );
        }

        body["apiVersion"] = json!(served.api_version());
        body["kind"] = json!(served.kind);
        let uid = self.next_uid();
        let rv = self.next_resource_version();
        let meta = metadata_mut(&mut body);
        meta.insert("uid".to_string(), json!(uid));
        meta.insert("resourceVersion".to_string(), json!(rv));
        if let Some(ns) = namespace.filter(|_| served.namespaced) {
            meta.insert("namespace".to_string(), json!(ns));
        }

        if served.plural == "daemonsets" {
            self.schedule_daemonset(&mut body, namespace.unwrap_or_default());
        }

        self.objects.insert(key, body.clone());
        (201, body)
    }

    fn schedule_daemonset(&mut self, daemonset: &mut Value, namespace: &str) {
        let nodes = self.nodes.clone();
        let desired = nodes.len();
        let ready = if self.daemonsets_ready { desired } else { 0 };
        daemonset["status"] = json!({
            "desiredNumberScheduled": desired,
            "currentNumberScheduled": ready,
            "numberReady": ready,
            "numberMisscheduled": 0
        });
        if !self.daemonsets_ready {
            return;
        }

        let name = str_of(&daemonset["metadata"]["name"]).to_string();
        let uid = daemonset["metadata"]["uid"].clone();
        let labels = daemonset["spec"]["template"]["metadata"]["labels"].clone();
        let containers = daemonset["spec"]["template"]["spec"]["containers"].clone();
        for node in nodes {
            let pod_name = format!("{}-{}", name, node);
            let pod = json!({
                "apiVersion": "v1",
                "kind": "Pod",
                "metadata": {
                    "name": pod_name,
                    "namespace": namespace,
                    "uid": self.next_uid(),
                    "resourceVersion": self.next_resource_version(),
                    "labels": labels,
                    "ownerReferences": [{
                        "apiVersion": "apps/v1",
                        "kind": "DaemonSet",
                        "name": name,
                        "uid": uid
                    }]
                },
                "spec": { "nodeName": node, "containers": containers }
            });
            let key: ObjectKey = (String::new(), "pods".into(), namespace.into(), pod_name);
            self.objects.insert(key, pod);
        }
    }

    fn replace(
        &mut self,
        served: &ServedType,
        namespace: Option<&str>,
        name: &str,
        mut body: Value,
    ) -> (u16, Value) {
        let key = self.key(served, namespace, name);
        let Some(stored) = self.objects.get(&key).cloned() else {
            return not_found(&format!("{} \"{}\" not found", served.plural, name));
        };
        if self.take_conflict(served, name) {
            return conflict(served, name);
        }
        let sent_rv = str_of(&body["metadata"]["resourceVersion"]);
        if !sent_rv.is_empty() && sent_rv != stored["metadata"]["resourceVersion"] {
            return conflict(served, name);
        }

        body["apiVersion"] = json!(served.api_version());
        body["kind"] = json!(served.kind);
        let rv = self.next_resource_version();
        let meta = metadata_mut(&mut body);
        meta.insert("uid".to_string(), stored["metadata"]["uid"].clone());
        meta.insert("resourceVersion".to_string(), json!(rv));
        let deleting = stored["metadata"].get("deletionTimestamp").cloned();
        if let Some(ts) = &deleting {
            meta.insert("deletionTimestamp".to_string(), ts.clone());
        }

        if deleting.is_some() && finalizers_of(&body).is_empty() {
            self.remove(&key);
        } else {
            self.objects.insert(key, body.clone());
        }
        (200, body)
    }

    fn delete(
        &mut self,
        served: &ServedType,
        namespace: Option<&str>,
        name: &str,
        body: Value,
    ) -> (u16, Value) {
        let key = self.key(served, namespace, name);
        let Some(mut stored) = self.objects.get(&key).cloned() else {
            return not_found(&format!("{} \"{}\" not found", served.plural, name));
        };
        if self.take_conflict(served, name) {
            return conflict(served, name);
        }

        self.deletes.push(DeleteRecord {
            group: served.group.clone(),
            plural: served.plural.clone(),
            namespace: namespace.map(|n| n.to_string()),
            name: name.to_string(),
            propagation_policy: body["propagationPolicy"].as_str().map(|p| p.to_string()),
            grace_period_seconds: body["gracePeriodSeconds"].as_i64(),
        });

        if finalizers_of(&stored).is_empty() {
            self.remove(&key);
            return (200, stored);
        }

        let rv = self.next_resource_version();
        let meta = metadata_mut(&mut stored);
        let timestamp = json!(DELETION_TIMESTAMP);
        meta.entry("deletionTimestamp").or_insert(timestamp);
        meta.insert("resourceVersion".to_string(), json!(rv));
        self.objects.insert(key, stored.clone());
        (200, stored)
    }

    /// Remove an object along with what its removal implies
    fn remove(&mut self, key: &ObjectKey) {
        let Some(object) = self.objects.remove(key) else {
            return;
        };
        let (group, plural, _, name) = key;

        if group.is_empty() && plural == "namespaces" {
            let contained: Vec<ObjectKey> = self
                .objects
                .keys()
                .filter(|k| k.2 == *name)
                .cloned()
                .collect();
            for k in contained {
                if let Some(inner) = self.objects.remove(&k) {
                    let blocked: Vec<String> = finalizers_of(&inner)
                        .into_iter()
                        .filter(|f| f.contains("cattle.io"))
                        .collect();
                    if !blocked.is_empty() {
                        self.violations.push(format!(
                            "{}/{}/{} removed with namespace {} while holding {:?}",
                            k.1, k.2, k.3, name, blocked
                        ));
                    }
                }
            }
        }

        if plural == "customresourcedefinitions" {
            if let Some((crd_plural, crd_group)) = name.split_once('.') {
                self.types
                    .retain(|t| !(t.plural == crd_plural && t.group == crd_group));
                self.objects
                    .retain(|k, _| !(k.0 == crd_group && k.1 == crd_plural));
            }
        }

        if plural == "daemonsets" {
            let uid = object["metadata"]["uid"].clone();
            self.objects.retain(|k, v| {
                k.1 != "pods"
                    || !v["metadata"]["ownerReferences"]
                        .as_array()
                        .is_some_and(|refs| refs.iter().any(|r| r["uid"] == uid))
            });
        }
    }
}

fn key_of(served: &ServedType, object: &Value) -> ObjectKey {
    let namespace = if served.namespaced {
        str_of(&object["metadata"]["namespace"])
    } else {
        ""
    };
    (
        served.group.clone(),
        served.plural.clone(),
        namespace.to_string(),
        str_of(&object["metadata"]["name"]).to_string(),
    )
}

fn str_of(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}

fn metadata_mut(object: &mut Value) -> &mut Map<String, Value> {
    if !object["metadata"].is_object() {
        object["metadata"] = json!({});
    }
    object["metadata"].as_object_mut().unwrap()
}

fn finalizers_of(object: &Value) -> Vec<String> {
    object["metadata"]["finalizers"]
        .as_array()
        .map(|f| {
            f.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}

/// Equality, inequality and existence terms joined by commas
fn selector_matches(selector: &str, object: &Value) -> bool {
    let labels = &object["metadata"]["labels"];
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| {
            if let Some((key, value)) = term.split_once("!=") {
                labels[key].as_str() != Some(value)
            } else if let Some((key, value)) =
                term.split_once("==").or_else(|| term.split_once('='))
            {
                labels[key].as_str() == Some(value)
            } else {
                !labels[term].is_null()
            }
        })
}

fn status(code: u16, reason: &str, message: &str) -> (u16, Value) {
    (
        code,
        json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": code
        }),
    )
}

fn unavailable(code: u16) -> (u16, Value) {
    status(
        code,
        "ServiceUnavailable",
        "the server is currently unable to handle the request",
    )
}

fn not_found(message: &str) -> (u16, Value) {
    status(404, "NotFound", message)
}

fn conflict(served: &ServedType, name: &str) -> (u16, Value) {
    status(
        409,
        "Conflict",
        &format!(
            "Operation cannot be fulfilled on {} \"{}\": the object has been modified",
            served.plural, name
        ),
    )
}

/// Build an object of the given type
pub fn object(api_version: &str, kind: &str, namespace: Option<&str>, name: &str) -> Value {
    let mut metadata = json!({ "name": name });
    if let Some(ns) = namespace {
        metadata["namespace"] = json!(ns);
    }
    json!({ "apiVersion": api_version, "kind": kind, "metadata": metadata })
}

pub fn namespace(name: &str) -> Value {
    object("v1", "Namespace", None, name)
}

pub fn with_labels(mut object: Value, labels: &[(&str, &str)]) -> Value {
    let map: Map<String, Value> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();
    metadata_mut(&mut object).insert("labels".to_string(), Value::Object(map));
    object
}

pub fn with_annotations(mut object: Value, annotations: &[(&str, &str)]) -> Value {
    let map: Map<String, Value> = annotations
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();
    metadata_mut(&mut object).insert("annotations".to_string(), Value::Object(map));
    object
}

pub fn with_finalizers(mut object: Value, finalizers: &[&str]) -> Value {
    metadata_mut(&mut object).insert("finalizers".to_string(), json!(finalizers));
    object
}

pub fn owned_by(mut object: Value, kind: &str, name: &str, uid: &str) -> Value {
    metadata_mut(&mut object).insert(
        "ownerReferences".to_string(),
        json!([{
            "apiVersion": "management.cattle.io/v3",
            "kind": kind,
            "name": name,
            "uid": uid,
        }]),
    );
    object
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_matching() {
        let labelled = with_labels(
            namespace("a"),
            &[("cattle.io/creator", "norman"), ("app", "x")],
        );

        assert!(selector_matches("", &labelled));
        assert!(selector_matches("cattle.io/creator=norman", &labelled));
        assert!(selector_matches("app==x,cattle.io/creator", &labelled));
        assert!(!selector_matches("app!=x", &labelled));
        assert!(!selector_matches("cattle.io/creator=someone", &labelled));
        assert!(!selector_matches("app==y", &labelled));
        assert!(!selector_matches("missing", &labelled));
    }

    #[test]
    fn test_finalized_object_is_only_marked_deleting() {
        let cluster = FakeCluster::new();
        cluster.insert(with_finalizers(namespace("held"), &["controller.cattle.io/x"]));

        let mut state = cluster.state.lock().unwrap();
        let served = state.types[0].clone();
        let (code, body) = state.delete(&served, None, "held", Value::Null);
        drop(state);

        assert_eq!(code, 200);
        assert_eq!(body["metadata"]["deletionTimestamp"], DELETION_TIMESTAMP);
        assert!(cluster.exists("", "namespaces", None, "held"));
    }
}

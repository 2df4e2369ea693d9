//! Canonical locations of records, used for redirects and action hrefs.

use crate::record::{value_to_param, ParentRef, Record};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};

/// Characters escaped inside one path segment (WHATWG path set plus `/` and `%`).
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

fn push_segment(path: &mut String, segment: &str) {
    path.push('/');
    path.extend(utf8_percent_encode(segment, SEGMENT));
}

/// Declared parent of a nested resource: the parent's path segment and the
/// attribute on the child holding the parent's id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentLink {
    pub resource: String,
    pub foreign_key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PathSegment {
    Collection { resource: String },
    Member { resource: String, id: String },
}

/// Routing parts of a record location: namespace, parent scope, the record itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PathParts {
    pub namespace: Option<String>,
    pub segments: Vec<PathSegment>,
}

impl PathParts {
    pub fn to_path(&self) -> String {
        let mut path = String::new();
        if let Some(ns) = self.namespace.as_deref() {
            for part in ns.split('/').filter(|p| !p.is_empty()) {
                push_segment(&mut path, part);
            }
        }
        for segment in &self.segments {
            match segment {
                PathSegment::Collection { resource } => push_segment(&mut path, resource),
                PathSegment::Member { resource, id } => {
                    push_segment(&mut path, resource);
                    push_segment(&mut path, id);
                }
            }
        }
        if path.is_empty() {
            path.push('/');
        }
        path
    }
}

/// Maps records of one resource to their canonical location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinkResolver {
    pub namespace: Option<String>,
    pub path_segment: String,
    pub parent: Option<ParentLink>,
}

impl LinkResolver {
    pub fn new(namespace: Option<String>, path_segment: impl Into<String>, parent: Option<ParentLink>) -> Self {
        LinkResolver {
            namespace,
            path_segment: path_segment.into(),
            parent,
        }
    }

    /// Persisted records map to their member location; unpersisted (new or
    /// destroyed) records to the collection location. Defined for every record.
    pub fn canonical_path(&self, record: &Record) -> PathParts {
        let mut segments = Vec::new();
        if let Some(parent) = self.parent_of(record) {
            segments.push(PathSegment::Member {
                resource: parent.resource,
                id: parent.id,
            });
        }
        match record.id_string().filter(|_| record.persisted) {
            Some(id) => segments.push(PathSegment::Member {
                resource: self.path_segment.clone(),
                id,
            }),
            None => segments.push(PathSegment::Collection {
                resource: self.path_segment.clone(),
            }),
        }
        PathParts {
            namespace: self.namespace.clone(),
            segments,
        }
    }

    /// Collection location, optionally scoped under a parent.
    pub fn collection_path(&self, parent: Option<&ParentRef>) -> PathParts {
        let mut segments = Vec::new();
        if let Some(p) = parent {
            segments.push(PathSegment::Member {
                resource: p.resource.clone(),
                id: p.id.clone(),
            });
        }
        segments.push(PathSegment::Collection {
            resource: self.path_segment.clone(),
        });
        PathParts {
            namespace: self.namespace.clone(),
            segments,
        }
    }

    fn parent_of(&self, record: &Record) -> Option<ParentRef> {
        if let Some(parent) = &record.parent {
            return Some(parent.clone());
        }
        let link = self.parent.as_ref()?;
        let id = record.get(&link.foreign_key).and_then(value_to_param)?;
        Some(ParentRef {
            resource: link.resource.clone(),
            id,
        })
    }
}

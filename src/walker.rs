use std::collections::{HashMap, HashSet};

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::debug;

use crate::pdf_utils::key_text;

/// Keys pointing back up the page tree. Following them from a page or an
/// annotation would reach every other page of the document.
const BACK_LINK_KEYS: &[&[u8]] = &[b"Parent", b"P"];

/// Upper bound on reference hops while resolving one indirect chain.
const MAX_REFERENCE_HOPS: usize = 32;

/// Follow an indirect reference (and any reference it points to) until a
/// direct object is reached.
///
/// Dangling references and reference cycles resolve to `None`.
pub fn resolve<'a>(document: &'a Document, obj: &'a Object) -> Option<&'a Object> {
    resolve_with_id(document, obj).map(|(_, o)| o)
}

/// Like [`resolve`], also returning the id of the last reference followed.
pub(crate) fn resolve_with_id<'a>(
    document: &'a Document,
    obj: &'a Object,
) -> Option<(Option<ObjectId>, &'a Object)> {
    let mut current = obj;
    let mut last_id = None;
    let mut seen: HashSet<ObjectId> = HashSet::new();

    while let Object::Reference(id) = current {
        if !seen.insert(*id) || seen.len() > MAX_REFERENCE_HOPS {
            debug!(?id, "reference chain loops back on itself");
            return None;
        }
        last_id = Some(*id);
        current = match document.get_object(*id) {
            Ok(o) => o,
            Err(e) => {
                debug!(?id, error = %e, "dangling reference skipped");
                return None;
            }
        };
    }

    Some((last_id, current))
}

/// Resolve to a dictionary. Streams are not dictionaries here.
pub(crate) fn resolve_dict<'a>(document: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    resolve(document, obj).and_then(|o| o.as_dict().ok())
}

/// Resolve to a stream.
pub(crate) fn resolve_stream<'a>(document: &'a Document, obj: &'a Object) -> Option<&'a Stream> {
    resolve(document, obj).and_then(|o| o.as_stream().ok())
}

/// Resolve to an array.
pub(crate) fn resolve_array<'a>(document: &'a Document, obj: &'a Object) -> Option<&'a Vec<Object>> {
    resolve(document, obj).and_then(|o| o.as_array().ok())
}

/// Look `key` up on a page, walking `/Parent` links for attributes the page
/// tree lets pages inherit (`/Resources`, `/MediaBox`, ...).
pub(crate) fn inherited_attribute<'a>(document: &'a Document, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
    let mut node = page;
    for _ in 0..MAX_REFERENCE_HOPS {
        if let Ok(value) = node.get(key) {
            return resolve(document, value);
        }
        node = resolve_dict(document, node.get(b"Parent").ok()?)?;
    }
    None
}

// ── StreamSite ───────────────────────────────────────────────────────────────

/// A stream encountered during traversal, with where it was found.
#[derive(Debug, Clone)]
pub struct StreamSite<'a> {
    /// Key (or `key_index` for array members) the stream was stored under.
    pub key: String,

    /// Structural path of the dictionary holding the stream.
    pub path: String,

    /// Object id when the stream was reached through a reference.
    pub id: Option<ObjectId>,

    pub stream: &'a Stream,
}

// ── ObjectWalker ─────────────────────────────────────────────────────────────

/// Depth-bounded traversal of a document's object graph that reports every
/// reachable stream.
///
/// An indirect container is entered again only when reached at a shallower
/// depth than before, so self-referential graphs terminate and an object
/// first met near the depth bound is still fully walked from a shorter path.
/// Each stream is reported once. The walker never mutates the document.
pub struct ObjectWalker<'a> {
    document: &'a Document,
    max_depth: usize,
    /// Shallowest depth each indirect container was entered at.
    entered: HashMap<ObjectId, usize>,
    /// Addresses of the streams already reported.
    reported: HashSet<usize>,
    nodes_visited: usize,
}

impl<'a> ObjectWalker<'a> {
    pub fn new(document: &'a Document, max_depth: usize) -> Self {
        Self {
            document,
            max_depth,
            entered: HashMap::new(),
            reported: HashSet::new(),
            nodes_visited: 0,
        }
    }

    /// Number of container nodes (dictionaries and arrays) entered so far.
    pub fn nodes_visited(&self) -> usize {
        self.nodes_visited
    }

    /// Walk everything reachable from `root`, which may be a reference, a
    /// dictionary, an array or a stream.
    pub fn walk(&mut self, root: &'a Object, path: &str, visit: &mut dyn FnMut(StreamSite<'a>)) {
        self.walk_value(path, root, path, 0, visit);
    }

    /// Walk the entries of `dict`, treating it as depth 0.
    pub fn walk_dict(&mut self, dict: &'a Dictionary, path: &str, visit: &mut dyn FnMut(StreamSite<'a>)) {
        self.walk_dict_at(dict, path, 0, visit);
    }

    /// Collect the streams reachable from `dict` instead of visiting them one
    /// by one.
    pub fn collect_streams(&mut self, dict: &'a Dictionary, path: &str) -> Vec<StreamSite<'a>> {
        let mut sites = Vec::new();
        self.walk_dict(dict, path, &mut |site| sites.push(site));
        sites
    }

    /// Collect the streams reachable from any object.
    pub fn collect_from(&mut self, root: &'a Object, path: &str) -> Vec<StreamSite<'a>> {
        let mut sites = Vec::new();
        self.walk(root, path, &mut |site| sites.push(site));
        sites
    }

    fn walk_dict_at(
        &mut self,
        dict: &'a Dictionary,
        path: &str,
        depth: usize,
        visit: &mut dyn FnMut(StreamSite<'a>),
    ) {
        self.nodes_visited += 1;

        for (key, value) in dict.iter() {
            if BACK_LINK_KEYS.contains(&key.as_slice()) {
                continue;
            }
            let key = key_text(key);
            self.walk_value(&key, value, path, depth, visit);
        }
    }

    fn walk_array_at(
        &mut self,
        items: &'a [Object],
        key: &str,
        path: &str,
        depth: usize,
        visit: &mut dyn FnMut(StreamSite<'a>),
    ) {
        self.nodes_visited += 1;

        for (index, item) in items.iter().enumerate() {
            let item_key = format!("{key}_{index}");
            self.walk_value(&item_key, item, path, depth, visit);
        }
    }

    /// Dispatch on one value found at `depth` under `path`.
    fn walk_value(
        &mut self,
        key: &str,
        value: &'a Object,
        path: &str,
        depth: usize,
        visit: &mut dyn FnMut(StreamSite<'a>),
    ) {
        let Some((id, resolved)) = resolve_with_id(self.document, value) else {
            return;
        };

        match resolved {
            Object::Stream(stream) => {
                if self.reported.insert(stream as *const Stream as usize) {
                    visit(StreamSite {
                        key: key.to_string(),
                        path: path.to_string(),
                        id,
                        stream,
                    });
                }
            }
            Object::Dictionary(child) => {
                let child_path = format!("{path}/{key}");
                if self.enter(id, &child_path, depth + 1) {
                    self.walk_dict_at(child, &child_path, depth + 1, visit);
                }
            }
            Object::Array(items) => {
                if self.enter(id, path, depth + 1) {
                    self.walk_array_at(items, key, path, depth + 1, visit);
                }
            }
            _ => {}
        }
    }

    /// Whether a container reached at `depth` should be walked. The depth
    /// bound is checked before the object is recorded, so a deep path never
    /// hides the object from a shallower one.
    fn enter(&mut self, id: Option<ObjectId>, path: &str, depth: usize) -> bool {
        if depth > self.max_depth {
            debug!(path, depth, "reached max depth");
            return false;
        }
        let Some(id) = id else {
            return true;
        };
        match self.entered.get(&id) {
            Some(&seen) if seen <= depth => false,
            _ => {
                self.entered.insert(id, depth);
                true
            }
        }
    }
}

use std::collections::HashSet;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::pdf_utils::{key_text, object_text};
use crate::walker::{resolve_array, resolve_dict, resolve_with_id};

/// Keys of a name-tree node that are structure rather than entries.
const STRUCTURAL_KEYS: &[&[u8]] = &[b"Names", b"Kids", b"Limits"];

/// One entry of a RichMedia `/Assets` tree: a name and the value it maps to,
/// normally a file specification.
#[derive(Debug, Clone)]
pub(crate) struct NamedAsset<'a> {
    pub name: String,
    pub value: &'a Object,
    /// Id of the referenced file specification, when it is indirect.
    pub id: Option<ObjectId>,
}

/// Discovers the entries of a RichMedia `/Assets` name tree.
///
/// The canonical layout is a name tree: leaf nodes carry a
/// `/Names [name value name value ...]` array and intermediate nodes carry
/// `/Kids`. Some producers instead store assets as plain dictionary keys;
/// that layout is used when the root has neither `/Names` nor `/Kids`.
pub(crate) struct AssetDiscovery<'a> {
    document: &'a Document,
}

impl<'a> AssetDiscovery<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Collect every entry of the tree rooted at `assets`.
    pub fn collect_assets(&self, assets: &'a Object) -> Vec<NamedAsset<'a>> {
        let Some(root) = resolve_dict(self.document, assets) else {
            return Vec::new();
        };

        if root.has(b"Names") || root.has(b"Kids") {
            let mut out = Vec::new();
            let mut seen = HashSet::new();
            if let Object::Reference(id) = assets {
                seen.insert(*id);
            }
            self.walk_name_tree(root, &mut seen, &mut out);
            return out;
        }

        debug!("assets without a name tree, using dictionary keys");
        self.collect_from_keys(root)
    }

    /// Recursively walk a name tree node, appending leaf entries.
    fn walk_name_tree(&self, node: &'a Dictionary, seen: &mut HashSet<ObjectId>, out: &mut Vec<NamedAsset<'a>>) {
        if let Some(names) = node.get(b"Names").ok().and_then(|v| resolve_array(self.document, v)) {
            out.extend(self.process_names_array(names));
        }

        let Some(kids) = node.get(b"Kids").ok().and_then(|v| resolve_array(self.document, v)) else {
            return;
        };
        for kid in kids {
            if let Object::Reference(id) = kid {
                if !seen.insert(*id) {
                    debug!(?id, "name tree kid already visited");
                    continue;
                }
            }
            if let Some(child) = resolve_dict(self.document, kid) {
                self.walk_name_tree(child, seen, out);
            }
        }
    }

    /// Pair up a `[name value name value ...]` array. A trailing unpaired name
    /// is ignored.
    fn process_names_array(&self, names: &'a [Object]) -> Vec<NamedAsset<'a>> {
        names
            .chunks_exact(2)
            .filter_map(|pair| {
                let name = resolve_with_id(self.document, &pair[0]).and_then(|(_, o)| object_text(o))?;
                Some(self.named(name, &pair[1]))
            })
            .collect()
    }

    fn collect_from_keys(&self, root: &'a Dictionary) -> Vec<NamedAsset<'a>> {
        root.iter()
            .filter(|(key, _)| !STRUCTURAL_KEYS.contains(&key.as_slice()))
            .map(|(key, value)| self.named(key_text(key), value))
            .collect()
    }

    fn named(&self, name: String, value: &'a Object) -> NamedAsset<'a> {
        NamedAsset {
            name,
            value,
            id: value.as_reference().ok(),
        }
    }
}

/// Name of the entry whose value is the object `id`.
pub(crate) fn asset_name_for(assets: &[NamedAsset<'_>], id: ObjectId) -> Option<String> {
    assets.iter().find(|a| a.id == Some(id)).map(|a| a.name.clone())
}

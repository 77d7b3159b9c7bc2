//! De-duplication and merge of discovered assets.
//!
//! The same embedded blob is often reachable from several places in one page
//! (XObject resources, annotation dictionaries, the RichMedia asset tree). The
//! registry keeps one entry per logical asset and folds the metadata each
//! rediscovery brings (hit region, time window) into that entry.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use crate::media::MediaAsset;

/// What [`MediaRegistry::try_add`] did with a candidate.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    /// Appended as a new asset.
    Added,
    /// Same asset as `index`; its missing hit region or time window was
    /// filled in from the candidate.
    Enriched { index: usize },
    /// Same asset as `index` and nothing new to add.
    Duplicate { index: usize },
    /// The candidate's file is missing or empty.
    Rejected,
}

impl AddOutcome {
    /// `true` when the candidate's file backs an asset in the registry.
    pub fn is_added(self) -> bool {
        matches!(self, AddOutcome::Added)
    }
}

/// Ordered, de-duplicated set of assets found on one page.
#[derive(Debug, Default)]
pub struct MediaRegistry {
    assets: Vec<MediaAsset>,
    sample_len: usize,
}

impl MediaRegistry {
    /// `sample_len` is the size of the leading byte sample compared when two
    /// files of equal length might hold the same content.
    pub fn new(sample_len: usize) -> Self {
        Self {
            assets: Vec::new(),
            sample_len: sample_len.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn assets(&self) -> &[MediaAsset] {
        &self.assets
    }

    pub fn into_assets(self) -> Vec<MediaAsset> {
        self.assets
    }

    /// `true` when some retained asset is backed by `path`.
    pub fn contains_path(&self, path: &Path) -> bool {
        self.assets.iter().any(|a| a.lives_at(path))
    }

    /// Offer a freshly materialized candidate.
    ///
    /// Resolution order:
    /// 1. an asset at the same path (preferring one with an identical hit
    ///    region) absorbs the candidate;
    /// 2. otherwise an asset of the same kind whose file has the same length
    ///    and the same leading bytes absorbs it;
    /// 3. otherwise the candidate is appended.
    ///
    /// Two assets whose hit regions are both set and differ are never merged,
    /// even when they share a file. When a candidate is not retained and no
    /// asset uses its file, the file is removed.
    pub fn try_add(&mut self, candidate: MediaAsset) -> AddOutcome {
        let len = match candidate.file_len() {
            Some(len) if len > 0 => len,
            _ => {
                debug!(path = %candidate.path.display(), "candidate file missing or empty");
                if !self.contains_path(&candidate.path) {
                    self.discard_file(&candidate.path);
                }
                return AddOutcome::Rejected;
            }
        };

        let same_path = self
            .position(|a| a.lives_at(&candidate.path) && a.hit_region == candidate.hit_region)
            .or_else(|| self.position(|a| a.lives_at(&candidate.path) && !regions_conflict(a, &candidate)));

        let matched = match same_path {
            Some(index) => Some(index),
            None if self.contains_path(&candidate.path) => None,
            None => self.same_content(&candidate, len),
        };

        let outcome = match matched {
            Some(index) => self.absorb(index, &candidate),
            None => {
                debug!(
                    name = %candidate.name,
                    kind = candidate.kind.label(),
                    path = %candidate.path.display(),
                    bytes = len,
                    tappable = candidate.is_tappable(),
                    "media asset added"
                );
                self.assets.push(candidate);
                return AddOutcome::Added;
            }
        };

        if !self.contains_path(&candidate.path) {
            self.discard_file(&candidate.path);
        }
        outcome
    }

    fn position(&self, pred: impl Fn(&MediaAsset) -> bool) -> Option<usize> {
        self.assets.iter().position(pred)
    }

    /// Fold `candidate` into the asset at `index`.
    fn absorb(&mut self, index: usize, candidate: &MediaAsset) -> AddOutcome {
        let existing = &mut self.assets[index];
        let mut enriched = false;

        if existing.hit_region.is_none() {
            if let Some(region) = candidate.hit_region {
                existing.hit_region = Some(region);
                existing.page_index = candidate.page_index.or(existing.page_index);
                enriched = true;
            }
        }
        if existing.time_window.is_none() && candidate.time_window.is_some() {
            existing.time_window = candidate.time_window;
            enriched = true;
        }

        if enriched {
            debug!(
                name = %existing.name,
                region = ?existing.hit_region,
                window = ?existing.time_window,
                "media asset enriched"
            );
            AddOutcome::Enriched { index }
        } else {
            debug!(name = %candidate.name, duplicate_of = %existing.name, "duplicate media skipped");
            AddOutcome::Duplicate { index }
        }
    }

    /// Index of an asset with the same kind, file length and leading bytes.
    fn same_content(&self, candidate: &MediaAsset, len: u64) -> Option<usize> {
        let candidates: Vec<usize> = self
            .assets
            .iter()
            .enumerate()
            .filter(|(_, a)| a.kind == candidate.kind && !regions_conflict(a, candidate))
            .filter(|(_, a)| a.file_len() == Some(len))
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return None;
        }

        let sample = read_sample(&candidate.path, self.sample_len)?;
        candidates.into_iter().find(|&i| {
            read_sample(&self.assets[i].path, self.sample_len).as_deref() == Some(sample.as_slice())
        })
    }

    fn discard_file(&self, path: &Path) {
        if !path.exists() {
            return;
        }
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "removed unreferenced cache file"),
            Err(e) => warn!(path = %path.display(), error = %e, "could not remove cache file"),
        }
    }
}

fn regions_conflict(existing: &MediaAsset, candidate: &MediaAsset) -> bool {
    match (existing.hit_region, candidate.hit_region) {
        (Some(a), Some(b)) => a != b,
        _ => false,
    }
}

/// Up to `len` leading bytes of a file. Unreadable or empty files yield
/// `None`, which never matches anything.
fn read_sample(path: &Path, len: usize) -> Option<Vec<u8>> {
    let file = File::open(path).ok()?;
    let mut buf = Vec::with_capacity(len);
    file.take(len as u64).read_to_end(&mut buf).ok()?;
    if buf.is_empty() {
        None
    } else {
        Some(buf)
    }
}

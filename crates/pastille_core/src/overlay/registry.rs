use super::{OverlayError, OverlayResult};
use crate::model::mark::{MarkBody, MarkId, MarkStyle, NormPoint};
use crate::model::overlay::{
    slugify, GeometryMismatchError, LayoutFingerprint, Overlay, OverlayDraft, TemplatedMark,
};
use crate::model::rubric::RubricTree;
use crate::store::annotation_store::AnnotationStore;
use crate::store::gesture::RegenerateSink;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{SystemTime, UNIX_EPOCH};

/// Outcome of a successful `apply`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Ids minted in the target store, in template order.
    pub added: Vec<MarkId>,
    /// Manual-points marks removed because the overlay supplied a new one.
    pub replaced: Vec<MarkId>,
}

/// Named overlays of one project, keyed by slug.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayRegistry {
    overlays: BTreeMap<String, Overlay>,
}

struct PreparedMark {
    page: u32,
    position: NormPoint,
    style: MarkStyle,
    body: MarkBody,
}

impl OverlayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }

    /// Copies every mark of `store` into templated form.
    pub fn capture_from(store: &AnnotationStore, fingerprint: LayoutFingerprint) -> OverlayDraft {
        let mut pages: BTreeMap<u32, Vec<TemplatedMark>> = BTreeMap::new();
        for mark in store.iter() {
            pages.entry(mark.page).or_default().push(TemplatedMark::from(mark));
        }
        OverlayDraft {
            fingerprint,
            source_document: None,
            pages,
        }
    }

    /// Registers a new overlay.
    ///
    /// # Errors
    /// - `InvalidName` when the name has no usable character.
    /// - `AlreadyExists` when the slug is taken; use `update` to replace.
    pub fn save(&mut self, name: &str, draft: OverlayDraft) -> OverlayResult<&Overlay> {
        let slug = checked_slug(name)?;
        if self.overlays.contains_key(&slug) {
            return Err(OverlayError::AlreadyExists(name.trim().to_string()));
        }
        Ok(self.store_overlay(slug, name, draft, "overlay_save"))
    }

    /// Fully replaces the templated marks of an existing overlay.
    pub fn update(&mut self, name: &str, draft: OverlayDraft) -> OverlayResult<&Overlay> {
        let slug = checked_slug(name)?;
        if !self.overlays.contains_key(&slug) {
            return Err(OverlayError::NotFound(name.trim().to_string()));
        }
        Ok(self.store_overlay(slug, name, draft, "overlay_update"))
    }

    fn store_overlay(
        &mut self,
        slug: String,
        name: &str,
        draft: OverlayDraft,
        event: &str,
    ) -> &Overlay {
        let overlay = Overlay::from_draft(name.trim(), draft, now_ms());
        info!(
            "event={} module=overlay status=ok slug={} marks={} pages={}",
            event,
            slug,
            overlay.mark_count(),
            overlay.fingerprint.page_count
        );
        self.overlays.insert(slug.clone(), overlay);
        &self.overlays[&slug]
    }

    pub fn get(&self, name: &str) -> Option<&Overlay> {
        self.overlays.get(&slugify(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn delete(&mut self, name: &str) -> OverlayResult<Overlay> {
        let removed = self
            .overlays
            .remove(&slugify(name))
            .ok_or_else(|| OverlayError::NotFound(name.trim().to_string()))?;
        info!(
            "event=overlay_delete module=overlay status=ok slug={}",
            removed.slug()
        );
        Ok(removed)
    }

    /// Overlay names sorted alphabetically.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .overlays
            .values()
            .map(|overlay| overlay.name.clone())
            .collect();
        names.sort();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = &Overlay> {
        self.overlays.values()
    }

    /// Checks loaded data: keys match name slugs, fingerprints and templates
    /// are coherent.
    pub(crate) fn check_integrity(&self) -> Result<(), String> {
        for (slug, overlay) in &self.overlays {
            if slugify(&overlay.name) != *slug {
                return Err(format!(
                    "overlay `{}` stored under key `{slug}`",
                    overlay.name
                ));
            }
            if overlay.fingerprint.page_count != overlay.fingerprint.pages.len() {
                return Err(format!(
                    "overlay `{}` fingerprint lists {} pages for page_count {}",
                    overlay.name,
                    overlay.fingerprint.pages.len(),
                    overlay.fingerprint.page_count
                ));
            }
            overlay
                .check_templates()
                .map_err(|message| format!("overlay `{}`: {message}", overlay.name))?;
        }
        Ok(())
    }

    /// Replays overlay `name` onto `target`.
    ///
    /// Every templated mark gets a fresh id. A manual-points template replaces
    /// the target's manual mark for the same node; other kinds are appended,
    /// so applying twice duplicates them. `sink` is signalled once on success.
    ///
    /// # Errors
    /// - `NotFound` for an unknown name.
    /// - `GeometryMismatch` when `target_fingerprint` differs from the overlay.
    /// - `InvalidLink` / `InvalidTemplate` when any templated mark cannot be
    ///   placed. Nothing is written to `target` on error.
    pub fn apply<S: RegenerateSink + ?Sized>(
        &self,
        name: &str,
        target: &mut AnnotationStore,
        target_fingerprint: &LayoutFingerprint,
        rubric: &RubricTree,
        sink: &mut S,
    ) -> OverlayResult<ApplyReport> {
        let overlay = self
            .get(name)
            .ok_or_else(|| OverlayError::NotFound(name.trim().to_string()))?;

        let prepared = match prepare(overlay, target_fingerprint, rubric) {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(
                    "event=overlay_apply module=overlay status=error slug={} error={}",
                    overlay.slug(),
                    err
                );
                return Err(err);
            }
        };

        let mut report = ApplyReport::default();
        for mark in prepared {
            if let MarkBody::ManualPoints { rubric_id, .. } = &mark.body {
                if let Some(existing) = target.manual_for(rubric_id).map(|manual| manual.id) {
                    target.remove(existing);
                    report.replaced.push(existing);
                }
            }
            report
                .added
                .push(target.append(mark.page, mark.position, mark.style, mark.body));
        }

        info!(
            "event=overlay_apply module=overlay status=ok slug={} added={} replaced={}",
            overlay.slug(),
            report.added.len(),
            report.replaced.len()
        );
        sink.regenerate(target);
        Ok(report)
    }
}

/// Validates the whole overlay against the target before anything is written.
fn prepare(
    overlay: &Overlay,
    target_fingerprint: &LayoutFingerprint,
    rubric: &RubricTree,
) -> OverlayResult<Vec<PreparedMark>> {
    overlay.fingerprint.check_compatible(target_fingerprint)?;
    overlay
        .check_templates()
        .map_err(OverlayError::InvalidTemplate)?;

    let mut prepared = Vec::with_capacity(overlay.mark_count());
    for (page, marks) in &overlay.pages {
        if *page as usize >= target_fingerprint.page_count {
            return Err(GeometryMismatchError::PageOutOfRange {
                page: *page,
                page_count: target_fingerprint.page_count,
            }
            .into());
        }
        for template in marks {
            template.body.validate_link(rubric)?;
            let style = template
                .style
                .normalized()
                .map_err(|value| OverlayError::InvalidTemplate(format!("style `{value}`")))?;
            prepared.push(PreparedMark {
                page: *page,
                position: template.position.clamped(),
                style,
                body: template.body.clone(),
            });
        }
    }
    Ok(prepared)
}

fn checked_slug(name: &str) -> OverlayResult<String> {
    let slug = slugify(name);
    if slug.is_empty() {
        return Err(OverlayError::InvalidName(name.to_string()));
    }
    Ok(slug)
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

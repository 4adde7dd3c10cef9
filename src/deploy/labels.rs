// ABOUTME: Container labels that namespace deployments by target and preview.
// ABOUTME: Used to find previous, orphaned and preview containers.

use crate::types::{BuildId, PreviewId, TargetId};
use std::collections::{BTreeMap, HashMap};

pub const MANAGED: &str = "deckhand.managed";
pub const TARGET: &str = "deckhand.target";
pub const PREVIEW: &str = "deckhand.preview";
pub const BUILD: &str = "deckhand.build";
/// `<target>` or `<target>-<preview>`.
pub const DEPLOYMENT: &str = "deckhand.deployment";
pub const ROLE: &str = "deckhand.role";

pub const ROLE_APP: &str = "app";
pub const ROLE_CERTBOT: &str = "certbot";

pub fn for_build(
    target: &TargetId,
    preview: Option<PreviewId>,
    build: &BuildId,
    deployment: &str,
) -> BTreeMap<String, String> {
    let mut labels = BTreeMap::new();
    labels.insert(MANAGED.to_string(), "true".to_string());
    labels.insert(ROLE.to_string(), ROLE_APP.to_string());
    labels.insert(TARGET.to_string(), target.to_string());
    labels.insert(BUILD.to_string(), build.to_string());
    labels.insert(DEPLOYMENT.to_string(), deployment.to_string());
    if let Some(id) = preview {
        labels.insert(PREVIEW.to_string(), id.to_string());
    }
    labels
}

/// Label filter selecting every app container of one deployment.
pub fn deployment_filter(target: &TargetId, preview: Option<PreviewId>) -> HashMap<String, String> {
    let mut labels = HashMap::new();
    labels.insert(MANAGED.to_string(), "true".to_string());
    labels.insert(TARGET.to_string(), target.to_string());
    labels.insert(ROLE.to_string(), ROLE_APP.to_string());
    if let Some(id) = preview {
        labels.insert(PREVIEW.to_string(), id.to_string());
    }
    labels
}

/// True when `labels` belong to exactly this target and preview.
///
/// The engine filter cannot express "no preview label", so production
/// lookups must also drop preview containers here.
pub fn belongs_to(
    labels: &HashMap<String, String>,
    target: &TargetId,
    preview: Option<PreviewId>,
) -> bool {
    let target_matches = labels.get(TARGET).is_some_and(|t| t == target.as_str());
    let preview_label = labels.get(PREVIEW).map(String::as_str);
    let preview_matches = match preview {
        Some(id) => preview_label == Some(id.to_string().as_str()),
        None => preview_label.is_none(),
    };
    target_matches && preview_matches
}

pub fn preview_of(labels: &HashMap<String, String>) -> Option<PreviewId> {
    labels.get(PREVIEW).and_then(|p| p.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target() -> TargetId {
        TargetId::new("site").unwrap()
    }

    #[test]
    fn production_does_not_match_previews() {
        let build = BuildId::new("abc".into());
        let preview: HashMap<_, _> = for_build(&target(), Some(PreviewId::new(42)), &build, "site-42")
            .into_iter()
            .collect();
        let production: HashMap<_, _> =
            for_build(&target(), None, &build, "site").into_iter().collect();

        assert!(belongs_to(&production, &target(), None));
        assert!(!belongs_to(&preview, &target(), None));
        assert!(belongs_to(&preview, &target(), Some(PreviewId::new(42))));
        assert!(!belongs_to(&preview, &target(), Some(PreviewId::new(7))));
        assert_eq!(preview_of(&preview), Some(PreviewId::new(42)));
    }
}

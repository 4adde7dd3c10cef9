// ABOUTME: Property tests for target ids, configuration fingerprints and deployment naming.
// ABOUTME: Names must stay DNS-safe and fingerprints must track only build-affecting fields.

use deckhand::model::{BuildPack, ConfigFingerprint, DeploymentTarget, EngineBinding};
use deckhand::types::{BuildId, Domain, PreviewId, TargetId};
use proptest::prelude::*;

fn arb_target_id() -> impl Strategy<Value = String> {
    "[a-z0-9]([a-z0-9-]{0,46}[a-z0-9])?"
}

fn arb_build_pack() -> impl Strategy<Value = BuildPack> {
    prop::sample::select(vec![BuildPack::Static, BuildPack::Node, BuildPack::Service])
}

fn arb_command() -> impl Strategy<Value = Option<String>> {
    prop::option::of("[a-z ]{1,20}")
}

fn target(id: &str, pack: BuildPack) -> DeploymentTarget {
    DeploymentTarget::new(TargetId::new(id).unwrap(), EngineBinding::local("deckhand"), pack)
}

proptest! {
    #[test]
    fn valid_labels_are_accepted(id in arb_target_id()) {
        let parsed = TargetId::new(&id).unwrap();
        prop_assert_eq!(parsed.as_str(), id.as_str());
    }

    #[test]
    fn uppercase_is_rejected(id in "[a-z]{0,5}[A-Z][a-z]{0,5}") {
        prop_assert!(TargetId::new(&id).is_err());
    }

    #[test]
    fn container_names_fit_a_hostname(id in arb_target_id(), preview in 0u64..100_000) {
        let t = target(&id, BuildPack::Static);
        let build = BuildId::generate();
        let name = t.container_name(Some(PreviewId::new(preview)), &build);
        prop_assert!(name.len() <= 63, "{} is too long", name);
        let prefix = format!("{}-{}-", id, preview);
        prop_assert!(name.starts_with(&prefix));
        prop_assert!(name.ends_with(build.short()));
    }

    #[test]
    fn fingerprint_is_deterministic(
        pack in arb_build_pack(),
        port in prop::option::of(1u16..),
        install in arb_command(),
        build in arb_command(),
    ) {
        let a = ConfigFingerprint::compute(pack, port, install.as_deref(), build.as_deref(), None);
        let b = ConfigFingerprint::compute(pack, port, install.as_deref(), build.as_deref(), None);
        prop_assert_eq!(a.as_str().len(), 64);
        prop_assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        prop_assert_eq!(a, b);
    }

    #[test]
    fn fingerprint_tracks_build_fields(
        pack in arb_build_pack(),
        port in 1u16..u16::MAX,
        install in "[a-z ]{1,20}",
    ) {
        let base = ConfigFingerprint::compute(pack, Some(port), Some(&install), None, None);
        prop_assert_ne!(&base, &ConfigFingerprint::compute(pack, Some(port + 1), Some(&install), None, None));
        prop_assert_ne!(&base, &ConfigFingerprint::compute(pack, Some(port), Some(&format!("{install}x")), None, None));
        prop_assert_ne!(&base, &ConfigFingerprint::compute(pack, Some(port), None, Some(&install), None));
        prop_assert_ne!(&base, &ConfigFingerprint::compute(pack, Some(port), Some(&install), None, Some("x")));
    }
}

#[test]
fn fingerprint_ignores_routing_fields() {
    let mut t = target("site", BuildPack::Static);
    let before = t.compute_fingerprint();
    t.domain = Some(Domain::parse("https://site.example.com").unwrap());
    t.force_ssl = true;
    t.env.insert("KEY".into(), "value".into());
    assert_eq!(t.compute_fingerprint(), before);
    assert!(!t.has_config_drift());
}

#[test]
fn preview_domain_falls_back_on_invalid_template() {
    let mut t = target("site", BuildPack::Static);
    t.domain = Some(Domain::parse("http://site.example.com").unwrap());
    t.preview_domain = Some("bad host {id}".into());

    let domain = t.domain_for(Some(PreviewId::new(5))).unwrap();

    assert_eq!(domain.host(), "5.site.example.com");
    assert!(!domain.is_https());
}

#[test]
fn unrouted_target_has_no_preview_domain() {
    let mut t = target("worker", BuildPack::Service);
    t.preview_domain = Some("{id}.preview.example.com".into());
    assert!(t.domain_for(None).is_none());
    assert!(t.domain_for(Some(PreviewId::new(1))).is_none());
}

use super::*;
use proptest::prelude::*;
use ssgkb_model::{
    DataStream, Benchmark, DsProfile, DsRule, DsRuleIdentifier, Manifest, Profile, Severity, Table,
    TableEntry,
};

fn edge(source: (ObjectType, &str), target: (ObjectType, &str), link: LinkType) -> CrossReference {
    CrossReference::new(source, target, link, json!({ "from": source.1 }), Utc::now())
}

fn keys(edges: &[CrossReference]) -> HashSet<(ObjectType, String, ObjectType, String, LinkType)> {
    edges
        .iter()
        .map(|e| {
            (
                e.source_type,
                e.source_id.clone(),
                e.target_type,
                e.target_id.clone(),
                e.link_type,
            )
        })
        .collect()
}

fn sample_guide() -> Guide {
    let now = Utc::now();
    Guide {
        id: "ssg-rhel9-guide-cis".into(),
        product: "rhel9".into(),
        profile_id: "xccdf_org.ssgproject.content_profile_cis".into(),
        short_id: "cis".into(),
        title: "CIS".into(),
        html_content: concat!(
            r#"<tr data-tt-id="xccdf_org.ssgproject.content_rule_aide_build_database">"#,
            r##"<a href="#xccdf_org.ssgproject.content_rule_aide_build_database">x</a>"##,
            r#"<tr data-tt-id="xccdf_org.ssgproject.content_rule_accounts_tmout">"#,
        )
        .into(),
        created_at: now,
        updated_at: now,
    }
}

#[test]
fn guide_edges_are_deduplicated_by_rule_id() {
    let edges = extract_guide_edges(&sample_guide());
    let rules: Vec<&str> = edges
        .iter()
        .filter(|e| e.link_type == LinkType::RuleId)
        .map(|e| e.target_id.as_str())
        .collect();
    assert_eq!(
        rules,
        vec![
            "xccdf_org.ssgproject.content_rule_aide_build_database",
            "xccdf_org.ssgproject.content_rule_accounts_tmout",
        ]
    );
    let first = edges.iter().find(|e| e.link_type == LinkType::RuleId).unwrap();
    assert_eq!(first.metadata()["rule_short_id"], "aide_build_database");

    let product = edges.iter().find(|e| e.link_type == LinkType::Product).unwrap();
    assert_eq!(product.target_key(), (ObjectType::Product, "rhel9"));
    let profile = edges.iter().find(|e| e.link_type == LinkType::ProfileId).unwrap();
    assert_eq!(profile.target_key(), (ObjectType::Profile, "rhel9:cis"));
    assert_eq!(edges.len(), 4);
}

#[test]
fn guide_without_product_or_profile_has_only_rule_edges() {
    let mut guide = sample_guide();
    guide.product.clear();
    guide.profile_id.clear();
    let edges = extract_guide_edges(&guide);
    assert!(edges.iter().all(|e| e.link_type == LinkType::RuleId));
}

#[test]
fn table_edges_take_unique_cces() {
    let now = Utc::now();
    let entry = |pos: i64, mapping: &str| TableEntry {
        id: format!("t:{pos}"),
        table_id: "table-rhel9-cces".into(),
        position: pos,
        mapping: mapping.into(),
        rule_title: format!("rule {pos}"),
        description: String::new(),
        rationale: String::new(),
        created_at: now,
        updated_at: now,
    };
    let parsed = ParsedTable {
        table: Table {
            id: "table-rhel9-cces".into(),
            product: "rhel9".into(),
            table_type: "cces".into(),
            title: String::new(),
            description: String::new(),
            created_at: now,
            updated_at: now,
        },
        entries: vec![
            entry(0, "CCE-80644-8"),
            entry(1, "CCE-80644-8"),
            entry(2, "AC-2(1)"),
            entry(3, "CCE-83437-4"),
        ],
    };
    let edges = extract_table_edges(&parsed);
    let cces: Vec<&str> = edges
        .iter()
        .filter(|e| e.link_type == LinkType::Cce)
        .map(|e| e.target_id.as_str())
        .collect();
    assert_eq!(cces, vec!["CCE-80644-8", "CCE-83437-4"]);
    assert_eq!(edges.len(), 3);
}

#[test]
fn manifest_edges_point_at_profile_keys() {
    let now = Utc::now();
    let parsed = ParsedManifest {
        manifest: Manifest {
            id: "manifest-rhel9".into(),
            product: "rhel9".into(),
            created_at: now,
            updated_at: now,
        },
        profiles: vec![Profile {
            id: "rhel9:stig".into(),
            manifest_id: "manifest-rhel9".into(),
            product: "rhel9".into(),
            profile_id: "stig".into(),
            rule_count: 2,
            created_at: now,
            updated_at: now,
        }],
        profile_rules: vec![],
    };
    let edges = extract_manifest_edges(&parsed);
    assert_eq!(edges.len(), 2);
    assert_eq!(edges[0].target_key(), (ObjectType::Profile, "rhel9:stig"));
    assert_eq!(edges[1].target_key(), (ObjectType::Product, "rhel9"));
}

#[test]
fn data_stream_edges_cover_rules_cces_profiles_and_product() {
    let now = Utc::now();
    let rule = |id: &str, cce: &str| DsRule {
        id: ids::full_rule_id(id),
        benchmark_id: "b".into(),
        group_id: "g".into(),
        title: String::new(),
        description: String::new(),
        rationale: String::new(),
        severity: Severity::Medium,
        selected: true,
        weight: "1.0".into(),
        version: String::new(),
        references: vec![],
        identifiers: vec![
            DsRuleIdentifier {
                system: "http://cce.mitre.org".into(),
                identifier: cce.into(),
            },
            DsRuleIdentifier {
                system: "https://public.cyber.mil/stigs/".into(),
                identifier: "SV-1".into(),
            },
        ],
        created_at: now,
        updated_at: now,
    };
    let parsed = ParsedDataStream {
        data_stream: DataStream {
            id: "ds-1".into(),
            product: "rhel9".into(),
            scap_version: "1.3".into(),
            timestamp: String::new(),
            created_at: now,
            updated_at: now,
        },
        benchmark: Benchmark {
            id: "b".into(),
            data_stream_id: "ds-1".into(),
            title: String::new(),
            description: String::new(),
            version: String::new(),
            status: String::new(),
            status_date: String::new(),
            profile_count: 1,
            group_count: 1,
            rule_count: 3,
            created_at: now,
            updated_at: now,
        },
        profiles: vec![DsProfile {
            id: "xccdf_org.ssgproject.content_profile_ospp".into(),
            benchmark_id: "b".into(),
            title: "OSPP".into(),
            description: String::new(),
            version: String::new(),
            rule_count: 0,
            selected_rules: vec![],
            created_at: now,
            updated_at: now,
        }],
        groups: vec![],
        rules: vec![
            rule("a", "CCE-1-1"),
            rule("b", "CCE-1-1"),
            rule("c", "CCE-2-2"),
        ],
    };

    let edges = extract_data_stream_edges(&parsed);
    let count = |link: LinkType| edges.iter().filter(|e| e.link_type == link).count();
    assert_eq!(count(LinkType::RuleId), 3);
    assert_eq!(count(LinkType::Cce), 2);
    assert_eq!(count(LinkType::ProfileId), 1);
    assert_eq!(count(LinkType::Product), 1);
    assert!(edges
        .iter()
        .any(|e| e.target_key() == (ObjectType::Profile, "rhel9:ospp")));
    assert!(edges.iter().all(|e| e.source_key() == (ObjectType::Datastream, "ds-1")));
}

#[test]
fn closure_links_sources_sharing_a_cce() {
    let initial = vec![
        edge((ObjectType::Guide, "guide-1"), (ObjectType::Cce, "CCE-80644-8"), LinkType::Cce),
        edge((ObjectType::Datastream, "ds-1"), (ObjectType::Cce, "CCE-80644-8"), LinkType::Cce),
    ];
    let closure = materialize(&initial);
    assert_eq!(closure.len(), 2);

    let forward = closure
        .iter()
        .find(|e| e.source_key() == (ObjectType::Guide, "guide-1"))
        .unwrap();
    assert_eq!(forward.target_key(), (ObjectType::Datastream, "ds-1"));
    assert_eq!(forward.link_type, LinkType::Cce);
    assert_eq!(forward.metadata()["from"], "guide-1");

    let backward = closure
        .iter()
        .find(|e| e.source_key() == (ObjectType::Datastream, "ds-1"))
        .unwrap();
    assert_eq!(backward.target_key(), (ObjectType::Guide, "guide-1"));
    assert_eq!(backward.link_type, LinkType::Cce);
    assert_eq!(backward.metadata()["from"], "ds-1");
}

#[test]
fn closure_skips_same_source_and_object_edges() {
    let initial = vec![
        edge((ObjectType::Guide, "g"), (ObjectType::Rule, "r"), LinkType::RuleId),
        edge((ObjectType::Guide, "g"), (ObjectType::Rule, "r"), LinkType::RuleId),
        edge((ObjectType::Guide, "g"), (ObjectType::Datastream, "d"), LinkType::RuleId),
        edge((ObjectType::Datastream, "d"), (ObjectType::Guide, "g"), LinkType::RuleId),
    ];
    assert!(materialize(&initial).is_empty());
}

fn arb_edge() -> impl Strategy<Value = CrossReference> {
    let sources = prop::sample::select(vec![
        (ObjectType::Guide, "g1"),
        (ObjectType::Guide, "g2"),
        (ObjectType::Table, "t1"),
        (ObjectType::Manifest, "m1"),
        (ObjectType::Datastream, "d1"),
        (ObjectType::Datastream, "d2"),
    ]);
    let targets = prop::sample::select(vec![
        (ObjectType::Cce, "CCE-1-1", LinkType::Cce),
        (ObjectType::Cce, "CCE-2-2", LinkType::Cce),
        (ObjectType::Product, "rhel9", LinkType::Product),
        (ObjectType::Rule, "xccdf_org.ssgproject.content_rule_a", LinkType::RuleId),
        (ObjectType::Profile, "rhel9:cis", LinkType::ProfileId),
    ]);
    (sources, targets).prop_map(|(s, (tt, tid, link))| edge(s, (tt, tid), link))
}

proptest! {
    #[test]
    fn closure_is_symmetric(initial in prop::collection::vec(arb_edge(), 0..24)) {
        let closure = materialize(&initial);
        let set = keys(&closure);
        for e in &closure {
            prop_assert_ne!(e.source_key(), e.target_key());
            let inverse = (
                e.target_type,
                e.target_id.clone(),
                e.source_type,
                e.source_id.clone(),
                e.link_type,
            );
            prop_assert!(set.contains(&inverse));
        }
    }

    #[test]
    fn closure_ignores_its_own_output(initial in prop::collection::vec(arb_edge(), 0..24)) {
        let first = materialize(&initial);
        let mut all = initial.clone();
        all.extend(first.iter().cloned());
        prop_assert_eq!(keys(&materialize(&all)), keys(&first));
    }
}

use ssgkb_ingest_xccdf::{parse_data_stream, parse_data_stream_file};
use ssgkb_model::{Severity, SsgError};
use std::io::Cursor;

const DATA_STREAM: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ds:data-stream-collection xmlns:ds="http://scap.nist.gov/schema/scap/source/1.2"
    xmlns:xccdf-1.2="http://checklists.nist.gov/xccdf/1.2"
    xmlns:html="http://www.w3.org/1999/xhtml"
    id="scap_org.open-scap_collection_from_xccdf_ssg-test-xccdf.xml" schematron-version="1.3">
  <ds:data-stream id="scap_org.open-scap_datastream_from_xccdf_ssg-test-xccdf.xml"
      scap-version="1.3" use-case="OTHER" timestamp="2024-05-06T10:11:12">
    <ds:checklists/>
  </ds:data-stream>
  <ds:component id="scap_org.open-scap_comp_ssg-test-xccdf.xml" timestamp="2024-05-06T10:11:12">
    <xccdf-1.2:Benchmark id="xccdf_org.ssgproject.content_benchmark_TEST" resolved="1" xml:lang="en-US">
      <xccdf-1.2:status date="2024-05-06">draft</xccdf-1.2:status>
      <xccdf-1.2:title>Guide to the Secure Configuration of Test OS</xccdf-1.2:title>
      <xccdf-1.2:description>This guide presents <html:i>a catalog</html:i> of settings.</xccdf-1.2:description>
      <xccdf-1.2:version>0.1.73</xccdf-1.2:version>
      <xccdf-1.2:Profile id="xccdf_org.ssgproject.content_profile_cis">
        <xccdf-1.2:title>CIS Benchmark</xccdf-1.2:title>
        <xccdf-1.2:description>Level 1<html:br/>  Server  </xccdf-1.2:description>
        <xccdf-1.2:select idref="xccdf_org.ssgproject.content_rule_aide_build_database" selected="true"/>
        <xccdf-1.2:select idref="xccdf_org.ssgproject.content_rule_accounts_tmout" selected="false"/>
      </xccdf-1.2:Profile>
      <xccdf-1.2:Group id="xccdf_org.ssgproject.content_group_system">
        <xccdf-1.2:title>System Settings</xccdf-1.2:title>
        <xccdf-1.2:description>Settings for the system.</xccdf-1.2:description>
        <xccdf-1.2:Group id="xccdf_org.ssgproject.content_group_software">
          <xccdf-1.2:title>Installing and Maintaining Software</xccdf-1.2:title>
          <xccdf-1.2:Rule id="xccdf_org.ssgproject.content_rule_aide_build_database" selected="false" severity="medium" weight="10.000000">
            <xccdf-1.2:title>Build and Test AIDE Database</xccdf-1.2:title>
            <xccdf-1.2:description>Run the following command:
              <html:pre>$ sudo /usr/sbin/aide --init</html:pre><html:br/>
              Compare &lt;path&gt; entries &amp; verify.</xccdf-1.2:description>
            <xccdf-1.2:rationale>For AIDE to be effective, an initial database must be built.</xccdf-1.2:rationale>
            <xccdf-1.2:reference href="https://www.cisecurity.org/benchmark/">1.3.1</xccdf-1.2:reference>
            <xccdf-1.2:reference href="http://nvlpubs.nist.gov/nistpubs/SpecialPublications/NIST.SP.800-53r4.pdf">CM-6(a)</xccdf-1.2:reference>
            <xccdf-1.2:ident system="https://nvd.nist.gov/cce/index.cfm">CCE-12345-6</xccdf-1.2:ident>
          </xccdf-1.2:Rule>
        </xccdf-1.2:Group>
        <xccdf-1.2:Rule id="xccdf_org.ssgproject.content_rule_accounts_tmout" selected="true" severity="high">
          <xccdf-1.2:title>Set Interactive Session Timeout</xccdf-1.2:title>
          <xccdf-1.2:description>Set <html:code>TMOUT=600</html:code> in <html:code>/etc/profile</html:code>.</xccdf-1.2:description>
        </xccdf-1.2:Rule>
      </xccdf-1.2:Group>
    </xccdf-1.2:Benchmark>
  </ds:component>
  <this is not read because parsing stops at the Benchmark end tag
"#;

#[test]
fn benchmark_contents_are_decoded() {
    let parsed = parse_data_stream(Cursor::new(DATA_STREAM), "ssg-test-ds.xml").unwrap();

    assert_eq!(
        parsed.data_stream.id,
        "scap_org.open-scap_datastream_from_xccdf_ssg-test-xccdf.xml"
    );
    assert_eq!(parsed.data_stream.product, "test");
    assert_eq!(parsed.data_stream.scap_version, "1.3");
    assert_eq!(parsed.data_stream.timestamp, "2024-05-06T10:11:12");

    let b = &parsed.benchmark;
    assert_eq!(b.id, "xccdf_org.ssgproject.content_benchmark_TEST");
    assert_eq!(b.data_stream_id, parsed.data_stream.id);
    assert_eq!((b.profile_count, b.group_count, b.rule_count), (1, 2, 2));
    assert_eq!(b.title, "Guide to the Secure Configuration of Test OS");
    assert_eq!(b.description, "This guide presents a catalog of settings.");
    assert_eq!(b.version, "0.1.73");
    assert_eq!(b.status, "draft");
    assert_eq!(b.status_date, "2024-05-06");

    let profile = &parsed.profiles[0];
    assert_eq!(profile.title, "CIS Benchmark");
    assert_eq!(profile.description, "Level 1\nServer");
    assert_eq!(profile.rule_count, 2);
    assert_eq!(profile.selected_rules.len(), 2);
    assert!(profile.selected_rules[0].selected);
    assert!(!profile.selected_rules[1].selected);

    let groups: Vec<(&str, &str, i64)> = parsed
        .groups
        .iter()
        .map(|g| (g.id.as_str(), g.parent_id.as_str(), g.level))
        .collect();
    assert_eq!(
        groups,
        vec![
            ("xccdf_org.ssgproject.content_group_system", "", 0),
            (
                "xccdf_org.ssgproject.content_group_software",
                "xccdf_org.ssgproject.content_group_system",
                1
            ),
        ]
    );
    assert_eq!((parsed.groups[0].group_count, parsed.groups[0].rule_count), (1, 1));
    assert_eq!((parsed.groups[1].group_count, parsed.groups[1].rule_count), (0, 1));

    let first = &parsed.rules[0];
    assert_eq!(first.id, "xccdf_org.ssgproject.content_rule_aide_build_database");
    assert_eq!(first.group_id, "xccdf_org.ssgproject.content_group_software");
    assert_eq!(first.severity, Severity::Medium);
    assert!(!first.selected);
    assert_eq!(first.weight, "10.000000");
    assert_eq!(first.references.len(), 2);
    assert_eq!(first.references[1].ref_id, "CM-6(a)");
    assert_eq!(first.identifiers.len(), 1);
    assert_eq!(first.identifiers[0].identifier, "CCE-12345-6");
    assert_eq!(first.cce_identifiers().collect::<Vec<_>>(), vec!["CCE-12345-6"]);
    assert_eq!(
        first.description,
        "Run the following command:\n$ sudo /usr/sbin/aide --init\n\nCompare &lt;path&gt; entries & verify."
    );

    let second = &parsed.rules[1];
    assert_eq!(second.group_id, "xccdf_org.ssgproject.content_group_system");
    assert_eq!(second.severity, Severity::High);
    assert!(second.selected);
    assert_eq!(second.weight, "1.0");
    assert_eq!(second.description, "Set TMOUT=600 in /etc/profile.");
}

#[test]
fn descriptions_are_plain_text() {
    let parsed = parse_data_stream(Cursor::new(DATA_STREAM), "ssg-test-ds.xml").unwrap();
    for rule in &parsed.rules {
        assert!(!rule.description.contains('<'), "{}", rule.description);
        assert!(!rule.description.contains('>'), "{}", rule.description);
    }
}

#[test]
fn parsing_is_deterministic() {
    let a = parse_data_stream(Cursor::new(DATA_STREAM), "ssg-test-ds.xml").unwrap();
    let b = parse_data_stream(Cursor::new(DATA_STREAM), "ssg-test-ds.xml").unwrap();
    let strip = |p: &ssgkb_model::ParsedDataStream| {
        (
            p.profiles.iter().map(|x| (x.id.clone(), x.title.clone(), x.selected_rules.clone())).collect::<Vec<_>>(),
            p.groups.iter().map(|x| (x.id.clone(), x.parent_id.clone(), x.level)).collect::<Vec<_>>(),
            p.rules
                .iter()
                .map(|x| (x.id.clone(), x.description.clone(), x.references.clone(), x.identifiers.clone()))
                .collect::<Vec<_>>(),
        )
    };
    assert_eq!(strip(&a), strip(&b));
}

#[test]
fn invalid_file_name_is_rejected() {
    let err = parse_data_stream(Cursor::new(DATA_STREAM), "invalid.xml").unwrap_err();
    assert!(matches!(err, SsgError::InvalidFormat(_)));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("invalid.xml");
    std::fs::write(&path, DATA_STREAM).unwrap();
    assert!(matches!(parse_data_stream_file(&path), Err(SsgError::InvalidFormat(_))));
}

#[test]
fn missing_benchmark_is_invalid() {
    let xml = r#"<ds:data-stream-collection xmlns:ds="x"><ds:data-stream id="a"/></ds:data-stream-collection>"#;
    assert!(matches!(
        parse_data_stream(Cursor::new(xml), "ssg-rhel9-ds.xml"),
        Err(SsgError::InvalidFormat(_))
    ));
}

#[test]
fn reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ssg-test-ds.xml");
    std::fs::write(&path, DATA_STREAM).unwrap();
    let parsed = parse_data_stream_file(&path).unwrap();
    assert_eq!(parsed.rules.len(), 2);
}

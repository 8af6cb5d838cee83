use ssgkb_ingest_guide::parse_guide_file;
use ssgkb_model::{ParsedGuide, Severity, SsgError};
use std::collections::HashMap;
use std::path::PathBuf;

const BENCH: &str = "xccdf_org.ssgproject.content_benchmark_AL-2023";
const G_SYSTEM: &str = "xccdf_org.ssgproject.content_group_system";
const G_SOFTWARE: &str = "xccdf_org.ssgproject.content_group_software";
const G_EMPTY: &str = "xccdf_org.ssgproject.content_group_services";
const R_AIDE: &str = "xccdf_org.ssgproject.content_rule_aide_build_database";
const R_PKG: &str = "xccdf_org.ssgproject.content_rule_package_aide_installed";
const R_TMOUT: &str = "xccdf_org.ssgproject.content_rule_accounts_tmout";
const R_ORPHAN: &str = "xccdf_org.ssgproject.content_rule_orphan_rule";

fn guide_html() -> String {
    format!(
        r##"<!DOCTYPE html>
<html><head><title>AL2023 CIS | OpenSCAP Security Guide</title></head>
<body>
<h2>Guide to the Secure Configuration of Amazon Linux 2023</h2>
<table class="table">
  <tr><th>Profile Title</th><td>CIS Amazon Linux 2023 Benchmark for Level 1 - Server</td></tr>
  <tr><th>Profile ID</th><td>xccdf_org.ssgproject.content_profile_cis_server_l1</td></tr>
</table>
<table class="treetable">
  <tr data-tt-id="{BENCH}"><td>Guide to the Secure Configuration</td></tr>
  <tr data-tt-id="{G_SYSTEM}" data-tt-parent-id="{BENCH}">
    <td><a href="#{G_SYSTEM}">System Settings</a> <small>Group contains 1 group and 1 rule</small>
        <p class="description">Contains rules that check system settings.</p></td>
  </tr>
  <tr data-tt-id="{G_SOFTWARE}" data-tt-parent-id="children-{G_SYSTEM}">
    <td>Group Installing and Maintaining Software Group contains 5 groups and 9 rules</td>
  </tr>
  <tr data-tt-id="{R_AIDE}" data-tt-parent-id="children-{G_SOFTWARE}" class="rule-overview-leaf severity-high">
    <td><span class="label label-default">Rule</span> Build and Test AIDE Database</td>
    <td>
      <p class="description">Run the following command to generate a new database: aide --init</p>
      <p class="rationale">For AIDE to be effective, an initial database must be built.</p>
      <table class="identifiers">
        <tr><td><a href="https://nvd.nist.gov/cce/index.cfm">CCE-80644-8</a></td><td>CCE-80644-8</td></tr>
        <tr><td><a href="https://www.cisecurity.org/benchmark/amazon_linux/">cis</a></td><td>1.3.1</td></tr>
      </table>
    </td>
  </tr>
  <tr data-tt-id="{R_PKG}" data-tt-parent-id="{G_SOFTWARE}">
    <td>package_aide_installed <span class="severity">low</span></td>
  </tr>
  <tr data-tt-id="{R_TMOUT}" data-tt-parent-id="{G_SYSTEM}">
    <td><span class="label label-default">Rule</span> Set Interactive Session Timeout</td>
  </tr>
  <tr data-tt-id="{G_EMPTY}" data-tt-parent-id="{BENCH}">
    <td><a href="#{G_EMPTY}">Services</a></td>
  </tr>
  <tr data-tt-id="{R_ORPHAN}" data-tt-parent-id="{BENCH}"><td>Orphan</td></tr>
</table>
</body></html>"##
    )
}

fn write_guide(dir: &tempfile::TempDir, name: &str, html: &str) -> PathBuf {
    let guides = dir.path().join("guides");
    std::fs::create_dir_all(&guides).unwrap();
    let path = guides.join(name);
    std::fs::write(&path, html).unwrap();
    path
}

fn parse_sample() -> ParsedGuide {
    let dir = tempfile::tempdir().unwrap();
    let path = write_guide(&dir, "ssg-al2023-guide-cis_server_l1.html", &guide_html());
    parse_guide_file(&path).unwrap()
}

#[test]
fn guide_identity_comes_from_file_name() {
    let parsed = parse_sample();
    assert_eq!(parsed.guide.id, "ssg-al2023-guide-cis_server_l1");
    assert_eq!(parsed.guide.product, "al2023");
    assert_eq!(parsed.guide.short_id, "cis_server_l1");
    assert_eq!(
        parsed.guide.profile_id,
        "xccdf_org.ssgproject.content_profile_cis_server_l1"
    );
    assert_eq!(
        parsed.guide.title,
        "CIS Amazon Linux 2023 Benchmark for Level 1 - Server"
    );
    assert!(parsed.guide.html_content.contains(R_AIDE));
}

#[test]
fn groups_have_levels_parents_and_titles() {
    let parsed = parse_sample();
    let groups: HashMap<&str, _> = parsed.groups.iter().map(|g| (g.id.as_str(), g)).collect();
    assert_eq!(groups.len(), 3);

    let system = groups[G_SYSTEM];
    assert_eq!(system.title, "System Settings");
    assert_eq!(system.parent_id, "");
    assert_eq!(system.level, 0);
    assert_eq!(system.description, "Contains rules that check system settings.");

    let software = groups[G_SOFTWARE];
    assert_eq!(software.title, "Installing and Maintaining Software");
    assert_eq!(software.parent_id, G_SYSTEM);
    assert_eq!(software.level, 1);

    assert_eq!(groups[G_EMPTY].title, "Services");
    assert!(parsed.groups.iter().all(|g| g.guide_id == parsed.guide.id));
}

#[test]
fn rules_carry_titles_severity_and_references() {
    let parsed = parse_sample();
    let rules: HashMap<&str, _> = parsed.rules.iter().map(|r| (r.id.as_str(), r)).collect();
    assert_eq!(rules.len(), 3, "rule outside any group is dropped");
    assert!(!rules.contains_key(R_ORPHAN));

    let aide = rules[R_AIDE];
    assert_eq!(aide.short_id, "aide_build_database");
    assert_eq!(aide.title, "Build and Test AIDE Database");
    assert_eq!(aide.group_id, G_SOFTWARE);
    assert_eq!(aide.level, 2);
    assert_eq!(aide.severity, Severity::High);
    assert!(aide.description.contains("aide --init"));
    assert!(aide.rationale.starts_with("For AIDE"));
    assert_eq!(aide.references.len(), 2);
    assert_eq!(aide.references[0].label, "CCE-80644-8");
    assert_eq!(aide.references[0].href, "https://nvd.nist.gov/cce/index.cfm");
    assert_eq!(aide.references[1].label, "cis");
    assert_eq!(aide.references[1].value, "1.3.1");

    let pkg = rules[R_PKG];
    assert_eq!(pkg.severity, Severity::Low);
    assert_eq!(pkg.title, "Package Aide Installed");

    let tmout = rules[R_TMOUT];
    assert_eq!(tmout.severity, Severity::Medium);
    assert_eq!(tmout.group_id, G_SYSTEM);
    assert_eq!(tmout.level, 1);
    assert!(tmout.references.is_empty());
}

#[test]
fn referential_and_count_invariants_hold() {
    let parsed = parse_sample();
    let groups: HashMap<&str, _> = parsed.groups.iter().map(|g| (g.id.as_str(), g)).collect();

    for rule in &parsed.rules {
        let group = groups.get(rule.group_id.as_str()).expect("rule group exists");
        assert_eq!(group.guide_id, rule.guide_id);
    }
    for group in &parsed.groups {
        if !group.parent_id.is_empty() {
            assert!(
                groups.contains_key(group.parent_id.as_str())
                    || group.parent_id.contains("content_benchmark")
            );
        }
        let rules = parsed.rules.iter().filter(|r| r.group_id == group.id).count() as i64;
        let children = parsed.groups.iter().filter(|h| h.parent_id == group.id).count() as i64;
        assert_eq!(group.rule_count, rules, "{}", group.id);
        assert_eq!(group.group_count, children, "{}", group.id);
    }

    // textual "5 groups and 9 rules" is overridden by the materialised counts
    let software = groups[G_SOFTWARE];
    assert_eq!((software.group_count, software.rule_count), (0, 2));
    let system = groups[G_SYSTEM];
    assert_eq!((system.group_count, system.rule_count), (1, 1));
}

#[test]
fn children_wrapper_rows_are_not_groups() {
    let dir = tempfile::tempdir().unwrap();
    let html = format!(
        r##"<html><body><table class="treetable">
            <tr data-tt-id="{BENCH}"><td>Guide</td></tr>
            <tr data-tt-id="children-{BENCH}" data-tt-parent-id="{BENCH}"><td></td></tr>
            <tr data-tt-id="{G_SYSTEM}" data-tt-parent-id="children-{BENCH}">
              <td><a href="#{G_SYSTEM}">System Settings</a></td>
            </tr>
            <tr data-tt-id="children-{G_SYSTEM}" data-tt-parent-id="{G_SYSTEM}"><td></td></tr>
            <tr data-tt-id="{R_TMOUT}" data-tt-parent-id="children-{G_SYSTEM}">
              <td><span class="label label-default">Rule</span> Set Interactive Session Timeout</td>
            </tr>
        </table></body></html>"##
    );
    let path = write_guide(&dir, "ssg-rhel9-guide-wrapped.html", &html);
    let parsed = parse_guide_file(&path).unwrap();

    assert_eq!(parsed.groups.len(), 1);
    let system = &parsed.groups[0];
    assert_eq!(system.id, G_SYSTEM);
    assert_eq!(system.parent_id, "");
    assert_eq!(system.level, 0);
    assert_eq!((system.group_count, system.rule_count), (0, 1));

    assert_eq!(parsed.rules.len(), 1);
    assert_eq!(parsed.rules[0].group_id, G_SYSTEM);
    assert_eq!(parsed.rules[0].level, 1);
}

#[test]
fn guide_without_rules_still_parses() {
    let dir = tempfile::tempdir().unwrap();
    let html = format!(
        r##"<html><body><table>
            <tr data-tt-id="{BENCH}"><td>Guide</td></tr>
            <tr data-tt-id="{G_SYSTEM}" data-tt-parent-id="{BENCH}"><td>Group System</td></tr>
        </table></body></html>"##
    );
    let path = write_guide(&dir, "ssg-rhel9-guide-minimal.html", &html);
    let parsed = parse_guide_file(&path).unwrap();
    assert_eq!(parsed.guide.title, "ssg-rhel9-guide-minimal");
    assert_eq!(parsed.groups.len(), 1);
    assert_eq!(parsed.groups[0].title, "System");
    assert!(parsed.rules.is_empty());
}

#[test]
fn unreadable_and_misnamed_files_fail() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("ssg-rhel9-guide-gone.html");
    assert!(matches!(parse_guide_file(&missing), Err(SsgError::IoRead { .. })));

    let misnamed = write_guide(&dir, "rhel9-guide.html", "<html></html>");
    assert!(matches!(parse_guide_file(&misnamed), Err(SsgError::InvalidFormat(_))));
}

//! Read-only commands over an existing knowledge base, plus `parse` and
//! `delete-guide`.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use ssgkb_model::{CrossReference, LinkType, ObjectType, Page, Severity, TreeNode};
use ssgkb_storage::{DsRuleFilter, GuideFilter, PageRequest, RuleFilter, Store};

use crate::{DsRuleArgs, ParseCommands, RuleArgs};

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn severity_label(severity: Severity) -> colored::ColoredString {
    match severity {
        Severity::High => severity.as_str().red(),
        Severity::Medium => severity.as_str().yellow(),
        Severity::Low => severity.as_str().green(),
        _ => severity.as_str().dimmed(),
    }
}

fn page_footer<T>(page: &Page<T>, request: PageRequest) {
    eprintln!(
        "{} {}-{} of {}",
        "showing".dimmed(),
        request.offset() + if page.items.is_empty() { 0 } else { 1 },
        request.offset() + page.items.len() as i64,
        page.total
    );
}

pub fn cmd_parse(command: ParseCommands, full: bool) -> Result<()> {
    let summary = match command {
        ParseCommands::Guide { input } => {
            let parsed = ssgkb_ingest_guide::parse_guide_file(&input)?;
            if full {
                return print_json(&parsed);
            }
            serde_json::json!({
                "id": parsed.guide.id,
                "product": parsed.guide.product,
                "profile_id": parsed.guide.profile_id,
                "title": parsed.guide.title,
                "groups": parsed.groups.len(),
                "rules": parsed.rules.len(),
            })
        }
        ParseCommands::Table { input } => {
            let parsed = ssgkb_ingest_table::parse_table_file(&input)?;
            if full {
                return print_json(&parsed);
            }
            serde_json::json!({
                "id": parsed.table.id,
                "product": parsed.table.product,
                "table_type": parsed.table.table_type,
                "entries": parsed.entries.len(),
            })
        }
        ParseCommands::Manifest { input } => {
            let parsed = ssgkb_ingest_json::parse_manifest_file(&input)?;
            if full {
                return print_json(&parsed);
            }
            serde_json::json!({
                "id": parsed.manifest.id,
                "product": parsed.manifest.product,
                "profiles": parsed.profiles.len(),
                "profile_rules": parsed.profile_rules.len(),
            })
        }
        ParseCommands::Datastream { input } => {
            let parsed = ssgkb_ingest_xccdf::parse_data_stream_file(&input)?;
            if full {
                return print_json(&parsed);
            }
            serde_json::json!({
                "id": parsed.data_stream.id,
                "product": parsed.data_stream.product,
                "benchmark": parsed.benchmark.id,
                "profiles": parsed.profiles.len(),
                "groups": parsed.groups.len(),
                "rules": parsed.rules.len(),
            })
        }
    };
    print_json(&summary)
}

pub fn cmd_guides(store: &Store, product: Option<String>, page: PageRequest, json: bool) -> Result<()> {
    let guides = store.list_guides(&GuideFilter { product }, page)?;
    if json {
        return print_json(&guides);
    }
    for guide in &guides.items {
        println!(
            "{}  {}  {}",
            guide.id.bold(),
            guide.product.cyan(),
            guide.title
        );
    }
    page_footer(&guides, page);
    Ok(())
}

fn print_tree(nodes: &[TreeNode], depth: usize) {
    for node in nodes {
        let indent = "  ".repeat(depth);
        match node {
            TreeNode::Group(g) => println!(
                "{indent}{} {} {}",
                "▸".blue(),
                g.title.bold(),
                format!("({} groups, {} rules)", g.group_count, g.rule_count).dimmed()
            ),
            TreeNode::Rule(r) => println!(
                "{indent}• {} [{}] {}",
                r.title,
                severity_label(r.severity),
                r.id.dimmed()
            ),
        }
        print_tree(node.children(), depth + 1);
    }
}

pub fn cmd_tree(store: &Store, guide_id: &str, json: bool) -> Result<()> {
    let forest = store.build_tree_nodes(guide_id)?;
    if json {
        return print_json(&forest);
    }
    print_tree(&forest, 0);
    Ok(())
}

pub fn cmd_benchmark_tree(store: &Store, benchmark_id: &str, json: bool) -> Result<()> {
    let forest = store.build_benchmark_tree_nodes(benchmark_id)?;
    if json {
        return print_json(&forest);
    }
    print_tree(&forest, 0);
    Ok(())
}

pub fn cmd_rules(store: &Store, args: RuleArgs, page: PageRequest, json: bool) -> Result<()> {
    let filter = RuleFilter {
        guide_id: args.guide,
        group_id: args.group,
        severity: args.severity,
        profile_id: args.profile,
    };
    let rules = store.list_rules(&filter, page)?;
    if json {
        return print_json(&rules);
    }
    for rule in &rules.items {
        println!(
            "[{}] {}  {}  {}",
            severity_label(rule.severity),
            rule.short_id.bold(),
            rule.title,
            rule.guide_id.dimmed()
        );
    }
    page_footer(&rules, page);
    Ok(())
}

pub fn cmd_ds_rules(store: &Store, args: DsRuleArgs, page: PageRequest, json: bool) -> Result<()> {
    let filter = DsRuleFilter {
        benchmark_id: args.benchmark,
        group_id: args.group,
        severity: args.severity,
        profile_id: args.profile,
    };
    let rules = store.list_ds_rules(&filter, page)?;
    if json {
        return print_json(&rules);
    }
    for rule in &rules.items {
        let cces: Vec<&str> = rule.cce_identifiers().collect();
        println!(
            "[{}] {}  {}  {}",
            severity_label(rule.severity),
            rule.id.bold(),
            rule.title,
            cces.join(",").cyan()
        );
    }
    page_footer(&rules, page);
    Ok(())
}

fn describe_edge(edge: &CrossReference) -> String {
    format!(
        "{}:{} {} {}:{}",
        edge.source_type,
        edge.source_id,
        format!("-[{}]->", edge.link_type).blue(),
        edge.target_type,
        edge.target_id
    )
}

pub fn cmd_related(
    store: &Store,
    object_type: ObjectType,
    object_id: &str,
    link_type: Option<LinkType>,
    limit: i64,
    offset: i64,
    json: bool,
) -> Result<()> {
    let edges = store.find_related_objects(object_type, object_id, link_type, limit, offset)?;
    if json {
        return print_json(&edges);
    }
    for edge in &edges {
        println!("{}", describe_edge(edge));
    }
    eprintln!("{} {} edges", "found".dimmed(), edges.len());
    Ok(())
}

pub fn cmd_delete_guide(store: &Store, guide_id: &str) -> Result<()> {
    store.delete_guide(guide_id)?;
    println!("{} {}", "deleted".green().bold(), guide_id);
    Ok(())
}

//! Markdown rendering of a finished run (the daily report page).

use std::fmt::Write as _;

use crate::model::{DomainReport, RunOutcome, UserAnalysis};

pub fn render_markdown(outcome: &RunOutcome) -> String {
    let mut md = String::new();
    let date = outcome.started_at.format("%Y-%m-%d");
    match &outcome.title {
        Some(t) => {
            let _ = writeln!(md, "# {t}\n");
            let _ = writeln!(md, "_Domain radar, {date}_\n");
        }
        None => {
            let _ = writeln!(md, "# Domain radar, {date}\n");
        }
    }
    let _ = writeln!(
        md,
        "{} domains, {} articles read.\n",
        outcome.reports.len(),
        outcome.total_articles()
    );

    for ua in &outcome.analyses {
        render_analysis(&mut md, ua);
    }

    md.push_str("## Domains\n\n");
    for r in &outcome.reports {
        render_domain(&mut md, r);
    }
    md
}

fn render_analysis(md: &mut String, ua: &UserAnalysis) {
    let a = &ua.analysis;
    let _ = writeln!(md, "## Deep analysis (user {})\n", ua.user_id);
    if let Some(t) = &a.title {
        let _ = writeln!(md, "**{t}**\n");
    }
    let _ = writeln!(md, "### Macro trends\n\n{}\n", a.macro_trends.trim());
    let _ = writeln!(md, "### Opportunities\n\n{}\n", a.opportunities.trim());
    let _ = writeln!(md, "### Risks\n\n{}\n", a.risks.trim());
    if !a.action_guides.is_empty() {
        md.push_str("### Action guide\n\n");
        for (i, g) in a.action_guides.iter().enumerate() {
            let _ = writeln!(md, "{}. {}", i + 1, g);
        }
        md.push('\n');
    }
}

fn render_domain(md: &mut String, r: &DomainReport) {
    let _ = writeln!(md, "### {} (score {})\n", r.domain, r.score);
    let _ = writeln!(md, "{}\n", r.overview.trim());
    if !r.key_events.is_empty() {
        md.push_str("**Key events**\n\n");
        for e in &r.key_events {
            let _ = writeln!(md, "- {e}");
        }
        md.push('\n');
    }
    let _ = writeln!(md, "**Trends**\n\n{}\n", r.trends.trim());
    if !r.articles.is_empty() {
        md.push_str("**Sources**\n\n");
        for a in &r.articles {
            let title = a.title.replace(['[', ']'], "");
            let _ = writeln!(md, "- [{title}]({})", a.link);
        }
        md.push('\n');
    }
}

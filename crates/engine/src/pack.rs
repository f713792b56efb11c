//! The context pack and its formatter.
//!
//! The formatter fills sections in canonical order:
//!
//! | Section | Budget |
//! |---------|--------|
//! | Identity | identity |
//! | Current Focus | identity (what Identity left) |
//! | Insights | insights |
//! | Experiments (In Progress / Planning / Past) | experiments |
//! | Documents | documents |
//! | Topics | topics |
//! | Recent Actions | actions |
//! | Connections | connections |
//! | Already Done | unweighted, capped at `max_excluded` |
//!
//! Each item is truncated to the per-item cap, then either fits whole in
//! what is left of its section budget or is dropped and the fill moves on to
//! the next item. Headers count against the section budget, and a section
//! with no fitting items is left out entirely.
//!
//! # Determinism
//!
//! Formatting uses no randomness and no clock; identical inputs produce
//! byte-identical text.

use chrono::{DateTime, Utc};
use contextweave_core::error::ContextError;
use contextweave_core::record::{
    Action, Connection, Document, Experiment, IdentityProfile, Insight, SourceKind, Topic,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::budget::{TokenAllocation, truncate_chars};
use crate::compactor::CompactContext;
use crate::profiles::Category;
use crate::relevance::TierKind;

// ── Types ─────────────────────────────────────────────────────────────────

/// One rendered section of the pack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Identity,
    CurrentFocus,
    Insights,
    Experiments,
    Documents,
    Topics,
    Actions,
    Connections,
    Excluded,
}

impl SectionKind {
    /// Heading text as it appears in the pack.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Identity => "Identity",
            Self::CurrentFocus => "Current Focus",
            Self::Insights => "Insights",
            Self::Experiments => "Experiments",
            Self::Documents => "Documents",
            Self::Topics => "Topics",
            Self::Actions => "Recent Actions",
            Self::Connections => "Connections",
            Self::Excluded => "Already Done (do not repeat)",
        }
    }

    fn heading_cost(&self) -> usize {
        // "## " + title + "\n"
        self.title().chars().count() + 4
    }
}

/// A run of lines, optionally under a `###` sub-heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub lines: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackSection {
    pub kind: SectionKind,
    pub groups: Vec<PackGroup>,
}

impl PackSection {
    pub fn item_count(&self) -> usize {
        self.groups.iter().map(|g| g.lines.len()).sum()
    }

    /// All lines of the section, sub-headings excluded.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().flat_map(|g| g.lines.iter().map(String::as_str))
    }

    fn render(&self, out: &mut String) {
        out.push_str("## ");
        out.push_str(self.kind.title());
        out.push('\n');
        for group in &self.groups {
            if let Some(label) = &group.label {
                out.push_str("### ");
                out.push_str(label);
                out.push('\n');
            }
            for line in &group.lines {
                out.push_str(line);
                out.push('\n');
            }
        }
    }
}

/// Budget usage of one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionStats {
    pub section: SectionKind,
    /// `None` for the unweighted exclusion ledger.
    pub budget_chars: Option<usize>,
    pub used_chars: usize,
    pub items_included: usize,
    pub items_total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// Did not fit in what was left of the section budget.
    Budget,
    /// Past `max_items_per_category`.
    ItemCap,
    /// Past `max_excluded`.
    LedgerCap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropRecord {
    pub section: SectionKind,
    pub count: usize,
    pub reason: DropReason,
}

/// Which tier ordered a relevance pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelevanceRecord {
    pub pool: Category,
    pub tier: TierKind,
    /// Items placed by the tier itself; the rest are recency backfill.
    pub ranked: usize,
    pub candidates: usize,
}

/// How the pack was built.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackMetadata {
    pub request_id: Uuid,
    pub consumer: String,
    pub profile: String,
    pub max_tokens: usize,
    /// Token estimate of `to_text()`.
    pub estimated_tokens: usize,
    pub generated_at: DateTime<Utc>,
    pub allocation: TokenAllocation,
    pub sections: Vec<SectionStats>,
    pub drops: Vec<DropRecord>,
    pub relevance: Vec<RelevanceRecord>,
    /// Categories lost to source failure or the deadline.
    pub degraded: Vec<SourceKind>,
}

/// The final, size-bounded context handed to a consumer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextPack {
    /// Non-empty sections in canonical order.
    pub sections: Vec<PackSection>,
    /// Titles the consumer must not repeat, as rendered.
    pub excluded: Vec<String>,
    pub metadata: PackMetadata,
}

impl ContextPack {
    /// Serialize to text. An empty pack is the empty string.
    pub fn to_text(&self) -> String {
        render_sections(&self.sections)
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn section(&self, kind: SectionKind) -> Option<&PackSection> {
        self.sections.iter().find(|s| s.kind == kind)
    }

    /// The whole pack, metadata included, as pretty JSON.
    pub fn to_json(&self) -> Result<String, ContextError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

pub(crate) fn render_sections(sections: &[PackSection]) -> String {
    let mut out = String::new();
    for (i, section) in sections.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        section.render(&mut out);
    }
    out
}

// ── Formatter ─────────────────────────────────────────────────────────────

/// Formatter limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackFormatter {
    pub max_items_per_category: usize,
    pub item_char_cap: usize,
    /// Cap for the identity statement and current focus.
    pub identity_char_cap: usize,
    pub max_excluded: usize,
}

impl Default for PackFormatter {
    fn default() -> Self {
        Self {
            max_items_per_category: 8,
            item_char_cap: 280,
            identity_char_cap: 1000,
            max_excluded: 40,
        }
    }
}

/// Formatter output, before metadata is attached.
#[derive(Debug, Clone, Default)]
pub struct FormattedPack {
    pub sections: Vec<PackSection>,
    pub excluded: Vec<String>,
    pub stats: Vec<SectionStats>,
    pub drops: Vec<DropRecord>,
}

impl PackFormatter {
    pub fn format(
        &self,
        ctx: &CompactContext,
        allocation: &TokenAllocation,
        excluded: &[String],
    ) -> FormattedPack {
        let mut out = FormattedPack::default();

        // Identity and current focus share one budget.
        let identity_budget = allocation.chars_for(Category::Identity);
        let mut identity = SectionBuilder::new(SectionKind::Identity, identity_budget, usize::MAX);
        identity.group(None, self.identity_lines(&ctx.identity));
        let focus_budget = identity_budget.saturating_sub(identity.used);
        out.push(identity);

        let mut focus = SectionBuilder::new(SectionKind::CurrentFocus, focus_budget, usize::MAX);
        focus.group(
            None,
            ctx.identity
                .focus_text()
                .map(|f| truncate_chars(&clean(f), self.identity_char_cap)),
        );
        out.push(focus);

        let mut insights = self.list_section(SectionKind::Insights, Category::Insights, allocation);
        insights.group(None, self.bullets(ctx.insights.iter().map(render_insight)));
        out.push(insights);

        let mut experiments =
            self.list_section(SectionKind::Experiments, Category::Experiments, allocation);
        experiments.group(
            Some("In Progress"),
            self.bullets(ctx.experiments.in_progress.iter().map(render_active_experiment)),
        );
        experiments.group(
            Some("Planning"),
            self.bullets(ctx.experiments.planning.iter().map(render_active_experiment)),
        );
        experiments.group(
            Some("Past"),
            self.bullets(ctx.experiments.historical.iter().map(render_past_experiment)),
        );
        out.push(experiments);

        let mut documents =
            self.list_section(SectionKind::Documents, Category::Documents, allocation);
        documents.group(None, self.bullets(ctx.documents.iter().map(render_document)));
        out.push(documents);

        let mut topics = self.list_section(SectionKind::Topics, Category::Topics, allocation);
        topics.group(None, self.bullets(ctx.topics.iter().map(render_topic)));
        out.push(topics);

        let mut actions = self.list_section(SectionKind::Actions, Category::Actions, allocation);
        actions.group(None, self.bullets(ctx.actions.iter().map(render_action)));
        out.push(actions);

        let mut connections =
            self.list_section(SectionKind::Connections, Category::Connections, allocation);
        connections.group(None, self.bullets(ctx.connections.iter().map(render_connection)));
        out.push(connections);

        self.push_ledger(&mut out, excluded);
        out
    }

    fn list_section(
        &self,
        kind: SectionKind,
        category: Category,
        allocation: &TokenAllocation,
    ) -> SectionBuilder {
        SectionBuilder::new(
            kind,
            allocation.chars_for(category),
            self.max_items_per_category,
        )
    }

    fn identity_lines(&self, identity: &IdentityProfile) -> Vec<String> {
        let mut lines = Vec::new();
        if let Some(statement) = identity.statement_text() {
            lines.push(truncate_chars(&clean(statement), self.identity_char_cap));
        }
        let values: Vec<String> = identity
            .values
            .iter()
            .map(|v| clean(v))
            .filter(|v| !v.is_empty())
            .collect();
        if !values.is_empty() {
            let line = format!("Values: {}", values.join(", "));
            lines.push(truncate_chars(&line, self.item_char_cap));
        }
        if let Some(phase) = identity.phase.as_deref().map(clean).filter(|p| !p.is_empty()) {
            lines.push(truncate_chars(&format!("Phase: {phase}"), self.item_char_cap));
        }
        lines
    }

    /// Truncate and bullet rendered items, skipping blanks.
    fn bullets<'a>(&'a self, items: impl Iterator<Item = String> + 'a) -> impl Iterator<Item = String> + 'a {
        items
            .filter(|text| !text.is_empty())
            .map(|text| format!("- {}", truncate_chars(&text, self.item_char_cap)))
    }

    /// `excluded` arrives newest first, so the cap keeps the most recent
    /// titles. Kept titles render alphabetically.
    fn push_ledger(&self, out: &mut FormattedPack, excluded: &[String]) {
        let lines: Vec<String> = excluded
            .iter()
            .map(|t| clean(t))
            .filter(|t| !t.is_empty())
            .collect();
        let total = lines.len();
        let mut kept: Vec<String> = lines
            .into_iter()
            .take(self.max_excluded)
            .map(|t| truncate_chars(&t, self.item_char_cap))
            .collect();
        kept.sort();

        if total > kept.len() {
            out.drops.push(DropRecord {
                section: SectionKind::Excluded,
                count: total - kept.len(),
                reason: DropReason::LedgerCap,
            });
        }

        let bullets: Vec<String> = kept.iter().map(|t| format!("- {t}")).collect();
        let used = if bullets.is_empty() {
            0
        } else {
            SectionKind::Excluded.heading_cost()
                + bullets.iter().map(|b| b.chars().count() + 1).sum::<usize>()
        };
        out.stats.push(SectionStats {
            section: SectionKind::Excluded,
            budget_chars: None,
            used_chars: used,
            items_included: bullets.len(),
            items_total: total,
        });
        if !bullets.is_empty() {
            out.sections.push(PackSection {
                kind: SectionKind::Excluded,
                groups: vec![PackGroup {
                    label: None,
                    lines: bullets,
                }],
            });
        }
        out.excluded = kept;
    }
}

impl FormattedPack {
    fn push(&mut self, builder: SectionBuilder) {
        let SectionBuilder {
            kind,
            budget,
            used,
            included,
            total,
            dropped_budget,
            dropped_cap,
            groups,
            ..
        } = builder;

        self.stats.push(SectionStats {
            section: kind,
            budget_chars: Some(budget),
            used_chars: used,
            items_included: included,
            items_total: total,
        });
        if dropped_budget > 0 {
            self.drops.push(DropRecord {
                section: kind,
                count: dropped_budget,
                reason: DropReason::Budget,
            });
        }
        if dropped_cap > 0 {
            self.drops.push(DropRecord {
                section: kind,
                count: dropped_cap,
                reason: DropReason::ItemCap,
            });
        }
        if !groups.is_empty() {
            self.sections.push(PackSection { kind, groups });
        }
    }
}

/// Greedy fill of one section against a char budget and an item cap.
struct SectionBuilder {
    kind: SectionKind,
    budget: usize,
    used: usize,
    max_items: usize,
    included: usize,
    total: usize,
    dropped_budget: usize,
    dropped_cap: usize,
    groups: Vec<PackGroup>,
}

impl SectionBuilder {
    fn new(kind: SectionKind, budget: usize, max_items: usize) -> Self {
        Self {
            kind,
            budget,
            used: 0,
            max_items,
            included: 0,
            total: 0,
            dropped_budget: 0,
            dropped_cap: 0,
            groups: Vec::new(),
        }
    }

    fn group(&mut self, label: Option<&str>, lines: impl IntoIterator<Item = String>) {
        // "### " + label + "\n"
        let label_cost = label.map_or(0, |l| l.chars().count() + 5);
        let mut kept = Vec::new();

        for line in lines {
            self.total += 1;
            if self.included >= self.max_items {
                self.dropped_cap += 1;
                continue;
            }

            let mut cost = line.chars().count() + 1;
            if kept.is_empty() {
                cost += label_cost;
                if self.groups.is_empty() {
                    cost += self.kind.heading_cost();
                }
            }

            if self.used + cost <= self.budget {
                self.used += cost;
                self.included += 1;
                kept.push(line);
            } else {
                self.dropped_budget += 1;
            }
        }

        if !kept.is_empty() {
            self.groups.push(PackGroup {
                label: label.map(str::to_string),
                lines: kept,
            });
        }
    }
}

// ── Item rendering ────────────────────────────────────────────────────────

/// Collapse whitespace runs (newlines included) to single spaces.
fn clean(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn titled(title: &str, body: &str) -> String {
    let title = clean(title);
    let body = clean(body);
    match (title.is_empty(), body.is_empty()) {
        (false, false) => format!("{title}: {body}"),
        (false, true) => title,
        (true, _) => body,
    }
}

fn render_insight(insight: &Insight) -> String {
    titled(&insight.title, &insight.body)
}

fn render_document(document: &Document) -> String {
    let text = titled(&document.title, &document.body);
    match document.kind.as_deref().map(clean).filter(|k| !k.is_empty()) {
        Some(kind) if !text.is_empty() => format!("[{kind}] {text}"),
        _ => text,
    }
}

fn render_active_experiment(experiment: &Experiment) -> String {
    let text = titled(&experiment.title, &experiment.body);
    match experiment.hypothesis.as_deref().map(clean).filter(|h| !h.is_empty()) {
        Some(hypothesis) if !text.is_empty() => format!("{text} (hypothesis: {hypothesis})"),
        _ => text,
    }
}

fn render_past_experiment(experiment: &Experiment) -> String {
    let text = titled(&experiment.title, &experiment.body);
    if text.is_empty() {
        return text;
    }
    format!("{text} ({})", experiment.status.as_str())
}

fn render_action(action: &Action) -> String {
    let title = clean(&action.title);
    let reflection = clean(&action.body);
    match (title.is_empty(), reflection.is_empty()) {
        (false, false) => format!("{title} (reflection: {reflection})"),
        (false, true) => title,
        (true, _) => reflection,
    }
}

fn render_topic(topic: &Topic) -> String {
    titled(&topic.title, &topic.body)
}

fn render_connection(connection: &Connection) -> String {
    let name = match connection
        .relationship
        .as_deref()
        .map(clean)
        .filter(|r| !r.is_empty())
    {
        Some(relationship) => format!("{} ({relationship})", clean(&connection.title)),
        None => clean(&connection.title),
    };
    titled(&name, &connection.body)
}

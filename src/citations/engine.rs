//! Citation linking: match generated prose against registered sources and
//! insert numbered marks.
//!
//! The engine owns one [`ReferenceRegistry`], so numbering is scoped to the
//! engine instance. Call [`CitationEngine::reset`] before compiling an
//! unrelated report.

use super::facts::{segment, FactUnit};
use super::patterns::{FactMatcher, Hit, PatternCatalog};
use super::registry::ReferenceRegistry;
use super::CitationStyle;
use crate::types::{AppError, Document, Result};
use crate::utils::toml_config::CitationConfig;
use std::collections::{HashMap, HashSet};
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
struct Slot {
    start: usize,
    end: usize,
    /// `(url, score)`, one entry per url.
    sources: Vec<(String, f32)>,
}

pub struct CitationEngine {
    matcher: Arc<dyn FactMatcher>,
    style: CitationStyle,
    merge_tolerance: usize,
    min_fact_chars: usize,
    title_max_chars: usize,
    facts: Vec<FactUnit>,
    registered: HashSet<String>,
    registry: ReferenceRegistry,
}

impl CitationEngine {
    pub fn new(matcher: Arc<dyn FactMatcher>, config: &CitationConfig) -> Self {
        Self {
            matcher,
            style: config.style,
            merge_tolerance: config.merge_tolerance,
            min_fact_chars: config.min_fact_chars,
            title_max_chars: config.title_max_chars,
            facts: Vec::new(),
            registered: HashSet::new(),
            registry: ReferenceRegistry::new(),
        }
    }

    /// Engine over the built-in pattern catalog plus configured extras.
    pub fn from_config(config: &CitationConfig) -> Result<Self> {
        let catalog = PatternCatalog::with_extra(&config.extra_patterns)?;
        Ok(Self::new(Arc::new(catalog), config))
    }

    pub fn style(&self) -> CitationStyle {
        self.style
    }

    pub fn registry(&self) -> &ReferenceRegistry {
        &self.registry
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    /// Segment a source into fact units. A url registered twice keeps its
    /// first content.
    pub fn register_source(&mut self, url: &str, title: &str, content: &str, score: f32) {
        if url.is_empty() || !self.registered.insert(url.to_string()) {
            return;
        }
        self.registry.set_title(url, title);

        let units = segment(content, self.min_fact_chars);
        debug!(url, units = units.len(), "Registered citation source");
        self.facts.extend(units.into_iter().map(|text| FactUnit {
            text,
            url: url.to_string(),
            score,
        }));
    }

    pub fn register_document(&mut self, doc: &Document) {
        self.register_source(&doc.url, &doc.title, &doc.content, doc.score);
    }

    pub fn register_documents<'a>(&mut self, docs: impl IntoIterator<Item = &'a Document>) {
        for doc in docs {
            self.register_document(doc);
        }
    }

    /// Insert citation marks into `text`.
    ///
    /// Works paragraph by paragraph (blocks separated by a blank line). A
    /// paragraph whose matching fails is returned unmarked. Spans that are
    /// already followed by a mark are left alone, so annotating twice gives
    /// the same result as annotating once.
    pub fn annotate(&mut self, text: &str) -> String {
        if self.facts.is_empty() {
            return text.to_string();
        }

        let paragraphs: Vec<String> = text
            .split("\n\n")
            .map(|paragraph| match self.annotate_paragraph(paragraph) {
                Ok(annotated) => annotated,
                Err(e) => {
                    warn!(error = %e, "Citation matching failed, keeping paragraph unmarked");
                    paragraph.to_string()
                }
            })
            .collect();
        paragraphs.join("\n\n")
    }

    /// Annotate a single paragraph, surfacing matching faults.
    pub fn annotate_paragraph(&mut self, paragraph: &str) -> Result<String> {
        if paragraph.trim_start().starts_with('#') && !paragraph.contains('\n') {
            return Ok(paragraph.to_string());
        }

        let protected = protected_ranges(paragraph);
        let mut slots = self.collect_slots(paragraph, &protected)?;
        if slots.is_empty() {
            return Ok(paragraph.to_string());
        }

        slots = merge_slots(slots, self.merge_tolerance);
        slots.retain(|slot| !followed_by_mark(paragraph, slot.end));

        // Numbers are assigned left to right, marks inserted right to left
        let mut marks = Vec::with_capacity(slots.len());
        for slot in &slots {
            let numbers: Vec<usize> = slot
                .sources
                .iter()
                .map(|(url, _)| self.registry.number_for(url))
                .collect();
            marks.push((slot.end, self.style.render(&numbers)));
        }

        let mut result = paragraph.to_string();
        for (end, mark) in marks.into_iter().rev() {
            result.insert_str(end, &mark);
        }
        Ok(result)
    }

    fn collect_slots(&self, paragraph: &str, protected: &[Range<usize>]) -> Result<Vec<Slot>> {
        let mut hits = self.matcher.find_hits(paragraph);
        hits.sort();
        hits.dedup();

        let mut cache: HashMap<&str, Vec<(String, f32)>> = HashMap::new();
        let mut slots = Vec::new();

        for Hit { start, end } in hits {
            if start >= end
                || end > paragraph.len()
                || !paragraph.is_char_boundary(start)
                || !paragraph.is_char_boundary(end)
            {
                return Err(AppError::Matching(format!(
                    "Hit {}..{} is not a valid span of a {}-byte paragraph",
                    start,
                    end,
                    paragraph.len()
                )));
            }
            if protected.iter().any(|r| start < r.end && r.start < end) {
                continue;
            }

            let span = &paragraph[start..end];
            let sources = cache
                .entry(span)
                .or_insert_with(|| self.sources_for(span))
                .clone();
            if !sources.is_empty() {
                slots.push(Slot { start, end, sources });
            }
        }
        Ok(slots)
    }

    /// Sources whose fact units contain `span` as a whole token, best score
    /// first.
    fn sources_for(&self, span: &str) -> Vec<(String, f32)> {
        let mut sources: Vec<(String, f32)> = Vec::new();
        for fact in self.facts.iter().filter(|f| contains_token(&f.text, span)) {
            match sources.iter_mut().find(|(url, _)| *url == fact.url) {
                Some(existing) => existing.1 = existing.1.max(fact.score),
                None => sources.push((fact.url.clone(), fact.score)),
            }
        }
        sort_sources(&mut sources);
        sources
    }

    /// Drop references no longer cited in `text` and renumber the rest in
    /// order of first appearance, rewriting every mark to match.
    ///
    /// Run this on the final body just before [`Self::references_section`],
    /// once later edits may have removed cited sentences.
    pub fn renumber_cited(&mut self, text: &str) -> String {
        let marks = find_marks(text);
        let cited: Vec<usize> = marks.iter().flat_map(|(_, numbers)| numbers.clone()).collect();
        let mapping = self.registry.retain_in_order(&cited);

        let mut result = String::with_capacity(text.len());
        let mut last = 0;
        for (range, numbers) in marks {
            let mut renumbered: Vec<usize> = Vec::with_capacity(numbers.len());
            for old in numbers {
                if let Some(&new) = mapping.get(&old) {
                    if !renumbered.contains(&new) {
                        renumbered.push(new);
                    }
                }
            }
            // marks pointing nowhere are not ours; leave them as written
            if renumbered.is_empty() {
                continue;
            }
            result.push_str(&text[last..range.start]);
            result.push_str(&self.style.render(&renumbered));
            last = range.end;
        }
        result.push_str(&text[last..]);
        result
    }

    /// `## References` block listing every cited source in number order.
    /// Empty when nothing has been cited.
    pub fn references_section(&self) -> String {
        if self.registry.is_empty() {
            return String::new();
        }

        let mut section = String::from("## References\n\n");
        for (number, url) in self.registry.entries() {
            let domain = domain_of(url);
            match self.registry.title(url) {
                Some(title) => section.push_str(&format!(
                    "{}. {}. {}. {}\n",
                    number,
                    cap_title(title, self.title_max_chars),
                    domain,
                    url
                )),
                None => section.push_str(&format!("{}. {}. {}\n", number, domain, url)),
            }
        }
        section
    }

    /// Drop every registered source and reference number.
    pub fn reset(&mut self) {
        self.facts.clear();
        self.registered.clear();
        self.registry.reset();
    }
}

/// True when `needle` occurs in `haystack` without running into a
/// neighbouring word or number: "3" is not found inside "2023" or "3.5".
fn contains_token(haystack: &str, needle: &str) -> bool {
    if needle.is_empty() {
        return false;
    }
    haystack
        .match_indices(needle)
        .any(|(start, _)| {
            let before = &haystack[..start];
            let after = &haystack[start + needle.len()..];
            open_before(before, needle) && open_after(after, needle)
        })
}

fn open_before(before: &str, needle: &str) -> bool {
    if !needle.starts_with(|c: char| c.is_alphanumeric()) {
        return true;
    }
    let mut rev = before.chars().rev();
    match rev.next() {
        None => true,
        Some(c) if c.is_alphanumeric() => false,
        // "1.5" or "1,500" continue a number
        Some('.' | ',') => !rev.next().is_some_and(|c| c.is_ascii_digit()),
        Some(_) => true,
    }
}

fn open_after(after: &str, needle: &str) -> bool {
    if !needle.ends_with(|c: char| c.is_alphanumeric()) {
        return true;
    }
    let mut chars = after.chars();
    match chars.next() {
        None => true,
        Some(c) if c.is_alphanumeric() => false,
        // sentence punctuation is fine, a decimal or thousands part is not
        Some('.' | ',') => !chars.next().is_some_and(|c| c.is_ascii_digit()),
        Some(_) => true,
    }
}

fn sort_sources(sources: &mut [(String, f32)]) {
    sources.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
}

/// Merge slots whose spans overlap or sit within `tolerance` bytes.
fn merge_slots(mut slots: Vec<Slot>, tolerance: usize) -> Vec<Slot> {
    slots.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut merged: Vec<Slot> = Vec::with_capacity(slots.len());
    for slot in slots {
        match merged.last_mut() {
            Some(last) if slot.start <= last.end + tolerance => {
                last.end = last.end.max(slot.end);
                for (url, score) in slot.sources {
                    match last.sources.iter_mut().find(|(u, _)| *u == url) {
                        Some(existing) => existing.1 = existing.1.max(score),
                        None => last.sources.push((url, score)),
                    }
                }
                sort_sources(&mut last.sources);
            }
            _ => merged.push(slot),
        }
    }
    merged
}

/// Byte length of a citation mark (any style) at the start of `s`.
fn mark_len(s: &str) -> Option<usize> {
    if let Some(inner) = s.strip_prefix("<sup>") {
        let run = bracket_run(inner, false);
        if run > 0 && inner[run..].starts_with("</sup>") {
            return Some("<sup>".len() + run + "</sup>".len());
        }
        return None;
    }
    let run = bracket_run(s, true);
    (run > 0).then_some(run)
}

/// Length of the consecutive `[n]` groups (also `[^n]` when `caret`) at the
/// start of `s`.
fn bracket_run(s: &str, caret: bool) -> usize {
    let mut len = 0;
    loop {
        let rest = &s[len..];
        let Some(body) = rest.strip_prefix('[') else {
            break;
        };
        let body = if caret {
            body.strip_prefix('^').unwrap_or(body)
        } else {
            body
        };
        let digits = body.bytes().take_while(|b| b.is_ascii_digit()).count();
        if digits == 0 || !body[digits..].starts_with(']') {
            break;
        }
        len += rest.len() - body.len() + digits + 1;
    }
    len
}

/// Existing marks and heading lines; hits touching them are ignored.
fn protected_ranges(paragraph: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();

    let mut idx = 0;
    while idx < paragraph.len() {
        let rest = &paragraph[idx..];
        if rest.starts_with('<') || rest.starts_with('[') {
            if let Some(len) = mark_len(rest) {
                ranges.push(idx..idx + len);
                idx += len;
                continue;
            }
        }
        idx += rest.chars().next().map_or(1, char::len_utf8);
    }

    let mut offset = 0;
    for line in paragraph.split_inclusive('\n') {
        if line.trim_start().starts_with('#') {
            ranges.push(offset..offset + line.len());
        }
        offset += line.len();
    }
    ranges
}

/// Every citation mark in `text` with the numbers it lists, left to right.
fn find_marks(text: &str) -> Vec<(Range<usize>, Vec<usize>)> {
    let mut marks = Vec::new();
    let mut idx = 0;
    while idx < text.len() {
        let rest = &text[idx..];
        if rest.starts_with('<') || rest.starts_with('[') {
            if let Some(len) = mark_len(rest) {
                let numbers = rest[..len]
                    .split(|c: char| !c.is_ascii_digit())
                    .filter_map(|digits| digits.parse().ok())
                    .collect();
                marks.push((idx..idx + len, numbers));
                idx += len;
                continue;
            }
        }
        idx += rest.chars().next().map_or(1, char::len_utf8);
    }
    marks
}

fn followed_by_mark(paragraph: &str, end: usize) -> bool {
    mark_len(paragraph[end..].trim_start_matches([' ', '\t'])).is_some()
}

fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| url.to_string())
}

fn cap_title(title: &str, max_chars: usize) -> String {
    let title = title.trim().trim_end_matches('.');
    if title.chars().count() <= max_chars {
        return title.to_string();
    }
    let kept: String = title.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

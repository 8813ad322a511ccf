//! Deterministic clean-up of the compiled report outline.
//!
//! The sweep pass asks the model for an exact structure; this enforces it
//! regardless of what came back:
//!
//! - a single `# {company} Research Report` title
//! - exactly the four `##` sections in report order, empty ones included
//! - unknown or repeated `##` headings demoted to `###`
//! - no headings inside News, only `*` bullets
//! - no code fences, `-`/`+` bullets rewritten to `*`
//! - at most one blank line between blocks

use crate::types::Category;

fn section_for(heading: &str) -> Option<Category> {
    let heading = heading.trim().trim_end_matches(':').trim();
    Category::ALL
        .into_iter()
        .find(|category| category.heading().eq_ignore_ascii_case(heading))
}

/// Level and text of a markdown ATX heading line.
fn parse_heading(line: &str) -> Option<(usize, &str)> {
    let trimmed = line.trim_start();
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 6 {
        return None;
    }
    let text = &trimmed[level..];
    if !text.is_empty() && !text.starts_with(' ') {
        return None;
    }
    Some((level, text.trim()))
}

fn normalize_bullet(line: &str) -> String {
    let indent = line.len() - line.trim_start().len();
    let body = &line[indent..];
    for marker in ["- ", "+ "] {
        if let Some(rest) = body.strip_prefix(marker) {
            return format!("{}* {}", &line[..indent], rest);
        }
    }
    line.to_string()
}

/// Rebuild `text` into the fixed four-section outline for `company`.
pub fn normalize_outline(company: &str, text: &str) -> String {
    let mut bodies: Vec<Vec<String>> = vec![Vec::new(); Category::ALL.len()];
    let mut current = 0usize;
    let mut seen = [false; 4];

    for raw in text.lines() {
        let line = raw.trim_end();
        if line.trim_start().starts_with("```") {
            continue;
        }

        if let Some((level, heading)) = parse_heading(line) {
            if level == 1 {
                continue;
            }
            if level == 2 {
                if let Some(category) = section_for(heading) {
                    let idx = category as usize;
                    if !seen[idx] {
                        seen[idx] = true;
                        current = idx;
                        continue;
                    }
                }
            }
            let line = if Category::ALL[current] == Category::News {
                format!("* {}", heading)
            } else {
                format!("### {}", heading)
            };
            bodies[current].push(line);
            continue;
        }

        bodies[current].push(normalize_bullet(line));
    }

    let mut out = format!("# {} Research Report", company.trim());
    for (category, body) in Category::ALL.iter().zip(bodies) {
        out.push_str("\n\n## ");
        out.push_str(category.heading());
        let body = collapse_blank_lines(&body);
        if !body.is_empty() {
            out.push_str("\n\n");
            out.push_str(&body);
        }
    }
    out
}

fn collapse_blank_lines(lines: &[String]) -> String {
    let mut out: Vec<&str> = Vec::with_capacity(lines.len());
    for line in lines {
        let blank = line.trim().is_empty();
        if blank && out.last().map_or(true, |last| last.is_empty()) {
            continue;
        }
        out.push(if blank { "" } else { line.as_str() });
    }
    while out.last().is_some_and(|last| last.is_empty()) {
        out.pop();
    }
    out.join("\n")
}

use std::fmt::Write;

use super::delta::{Delta, DeltaKind};
use super::engine::split_lines;

/// Group a delta sequence into independent hunks.
///
/// A cut happens whenever two consecutive Equal deltas are not
/// line-contiguous - that is where one context window ends and the next
/// begins. The resulting indices are stable and used to address single
/// hunks for a revert.
pub fn split_into_hunks(deltas: &[Delta]) -> Vec<Vec<Delta>> {
    let mut hunks = Vec::new();
    let mut block: Vec<Delta> = Vec::new();

    for (idx, delta) in deltas.iter().enumerate() {
        if delta.kind == DeltaKind::Equal
            && idx > 0
            && deltas[idx - 1].kind == DeltaKind::Equal
            && delta.line_from - deltas[idx - 1].line_from > 1
        {
            hunks.push(block);
            block = Vec::new();
        }
        block.push(delta.clone());
    }
    if !block.is_empty() {
        hunks.push(block);
    }
    hunks
}

/// Render line based deltas as side-by-side HTML table rows, one string
/// per hunk.
pub fn side_by_side_html(deltas: &[Delta]) -> Vec<String> {
    let mut blocks = Vec::new();
    if deltas.is_empty() {
        return blocks;
    }

    for hunk in split_into_hunks(deltas) {
        let mut buf = String::new();
        let mut idx = 0;

        while idx < hunk.len() {
            // prev context
            if let Some(delta) = take_kind(&hunk, &mut idx, DeltaKind::Equal) {
                push_equal_rows(&mut buf, delta);
            }

            let del = take_kind(&hunk, &mut idx, DeltaKind::Delete);
            let ins = take_kind(&hunk, &mut idx, DeltaKind::Insert);

            let del_lines = del.map(|d| cleaned_lines(&d.text)).unwrap_or_default();
            let ins_lines = ins.map(|d| cleaned_lines(&d.text)).unwrap_or_default();

            for i in 0..del_lines.len().max(ins_lines.len()) {
                buf.push_str("<tr>");
                match (del, del_lines.get(i)) {
                    (Some(d), Some(line)) => {
                        let _ = write!(
                            buf,
                            "<td class='diff-line-nr'>{}</td><td class='diff-del'>{}</td>",
                            d.line_from + i,
                            line
                        );
                    }
                    _ => buf.push_str("<td class='diff-line-nr'></td><td></td>"),
                }
                match (ins, ins_lines.get(i)) {
                    (Some(d), Some(line)) => {
                        let _ = write!(
                            buf,
                            "<td class='diff-line-nr'>{}</td><td class='diff-ins'>{}</td>",
                            d.line_target + i,
                            line
                        );
                    }
                    _ => buf.push_str("<td class='diff-line-nr'></td><td></td>"),
                }
                buf.push_str("</tr>");
            }

            // after context
            if let Some(delta) = take_kind(&hunk, &mut idx, DeltaKind::Equal) {
                push_equal_rows(&mut buf, delta);
            }
        }

        blocks.push(buf);
    }

    blocks
}

/// Render char based deltas as inline HTML, one string per hunk.
pub fn inline_html(deltas: &[Delta]) -> Vec<String> {
    let mut blocks = Vec::new();
    if deltas.is_empty() {
        return blocks;
    }

    for hunk in split_into_hunks(deltas) {
        let mut spans = String::new();
        for delta in &hunk {
            let class = match delta.kind {
                DeltaKind::Insert => "diff-ins",
                DeltaKind::Delete => "diff-del",
                DeltaKind::Equal => "diff-eq",
            };
            let mut text = escape_html(&delta.text);
            if text == "\n" {
                // make a bare newline change visible
                text = "&#9252;\n".to_string();
            }
            let _ = write!(spans, "<span class='{class}'>{text}</span>");
        }

        // split at newlines and prefix each line with its target line number
        let line_nr = hunk[0].line_target;
        let mut buf = String::new();
        for (i, line) in split_lines(&spans).iter().enumerate() {
            let _ = write!(buf, "<span class='diff-line-nr'>{}</span> {}", line_nr + i, line);
        }
        blocks.push(buf);
    }

    blocks
}

/// Plain text rendering of line based deltas for terminal output.
pub fn pretty_text(deltas: &[Delta]) -> String {
    let mut out = String::new();
    for (i, hunk) in split_into_hunks(deltas).iter().enumerate() {
        if i > 0 {
            out.push_str("...\n");
        }
        for delta in hunk {
            for (j, line) in split_lines(&delta.text).iter().enumerate() {
                let line = line.strip_suffix('\n').unwrap_or(line);
                let _ = match delta.kind {
                    DeltaKind::Equal => writeln!(
                        out,
                        "{:>5} {:>5}   {}",
                        delta.line_from + j,
                        delta.line_target + j,
                        line
                    ),
                    DeltaKind::Delete => {
                        writeln!(out, "{:>5} {:>5} - {}", delta.line_from + j, "", line)
                    }
                    DeltaKind::Insert => {
                        writeln!(out, "{:>5} {:>5} + {}", "", delta.line_target + j, line)
                    }
                };
            }
        }
    }
    out
}

fn take_kind<'a>(deltas: &'a [Delta], idx: &mut usize, kind: DeltaKind) -> Option<&'a Delta> {
    if *idx < deltas.len() && deltas[*idx].kind == kind {
        let delta = &deltas[*idx];
        *idx += 1;
        Some(delta)
    } else {
        None
    }
}

fn push_equal_rows(buf: &mut String, delta: &Delta) {
    for (i, line) in cleaned_lines(&delta.text).iter().enumerate() {
        let _ = write!(
            buf,
            "<tr><td class='diff-line-nr'>{}</td><td>{}</td><td class='diff-line-nr'>{}</td><td>{}</td></tr>",
            delta.line_from + i,
            line,
            delta.line_target + i,
            line
        );
    }
}

/// Escape for HTML embedding and make whitespace visible in table cells.
fn cleaned_lines(text: &str) -> Vec<String> {
    let cleaned = escape_html(text)
        .replace('\t', "&nbsp;&nbsp;")
        .replace(' ', "&nbsp;");
    split_lines(&cleaned).iter().map(|s| s.to_string()).collect()
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::engine::compute_diff;

    const TINY1: &str = "a\nb\nc\nd\ne\nf\ng\nh\ni\nj\nk\nl\nm\nn\n";
    const TINY2: &str = "a\nb\nC\nd\ne\nf\ng\nh\nI\nj\nk\nl\nm\nn\n";

    #[test]
    fn test_split_into_hunks() {
        let deltas = compute_diff(TINY1, TINY2, 1).line_deltas;
        let hunks = split_into_hunks(&deltas);
        assert_eq!(hunks.len(), 2);
        // each hunk: prev context, del, ins, after context
        assert_eq!(hunks[0].len(), 4);
        assert_eq!(hunks[1].len(), 4);
        assert_eq!(hunks[0][1].text, "c\n");
        assert_eq!(hunks[1][1].text, "i\n");
    }

    #[test]
    fn test_split_into_hunks_merged_context() {
        // overlapping context windows keep everything in one hunk
        let deltas = compute_diff(TINY1, TINY2, 3).line_deltas;
        assert_eq!(split_into_hunks(&deltas).len(), 1);
    }

    #[test]
    fn test_split_into_hunks_empty() {
        assert!(split_into_hunks(&[]).is_empty());
    }

    #[test]
    fn test_side_by_side_html() {
        let deltas = compute_diff(TINY1, TINY2, 1).line_deltas;
        let blocks = side_by_side_html(&deltas);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].contains("<td class='diff-del'>c\n</td>"));
        assert!(blocks[0].contains("<td class='diff-ins'>C\n</td>"));
        // context rows carry line numbers on both sides
        assert!(blocks[0].contains("<td class='diff-line-nr'>2</td><td>b\n</td>"));
    }

    #[test]
    fn test_side_by_side_html_escapes() {
        let deltas = compute_diff("x <y>\n", "x <z>\n", 0).line_deltas;
        let blocks = side_by_side_html(&deltas);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].contains("&lt;z&gt;"));
        assert!(blocks[0].contains("&nbsp;"));
        assert!(!blocks[0].contains("<y>"));
    }

    #[test]
    fn test_inline_html() {
        let deltas = compute_diff("abc\n", "axc\n", 0).char_deltas;
        let blocks = inline_html(&deltas);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].contains("<span class='diff-del'>b</span>"));
        assert!(blocks[0].contains("<span class='diff-ins'>x</span>"));
        assert!(blocks[0].starts_with("<span class='diff-line-nr'>1</span>"));
    }

    #[test]
    fn test_pretty_text() {
        let deltas = compute_diff(TINY1, TINY2, 1).line_deltas;
        let text = pretty_text(&deltas);
        assert!(text.contains("- c"));
        assert!(text.contains("+ C"));
        // hunk separator between the two changes
        assert!(text.contains("...\n"));
    }

    #[test]
    fn test_empty_renderings() {
        assert!(side_by_side_html(&[]).is_empty());
        assert!(inline_html(&[]).is_empty());
        assert_eq!(pretty_text(&[]), "");
    }
}

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Split priority: paragraph break, then line break, then word boundary.
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

/// Bullet markers that open a list item.
const BULLETS: [char; 3] = ['-', '•', '*'];

/// Chunk size and overlap. For section text both are measured in
/// characters; for tables they are measured in rows.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SplitterConfig {
    /// Upper bound on chunk size.
    pub chunk_size: usize,
    /// Trailing context repeated at the start of the next chunk.
    pub overlap_size: usize,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1440,
            overlap_size: 256,
        }
    }
}

impl SplitterConfig {
    /// Window advance: chunk size minus overlap, at least one.
    fn stride(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap_size).max(1)
    }
}

/// What a chunk was cut from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    /// Free-form section text.
    Text,
    /// Newline-delimited table rows.
    Table,
}

/// Context metadata attached to every chunk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Text or table.
    #[serde(rename = "type")]
    pub kind: ChunkKind,
    /// Table header row, for table chunks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<String>,
    /// 1-based first content row of a table window.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_row: Option<usize>,
    /// Number of content rows in a table chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
}

impl ChunkMetadata {
    fn text() -> Self {
        Self {
            kind: ChunkKind::Text,
            header: None,
            start_row: None,
            row_count: None,
        }
    }
}

/// A bounded segment of document text or table rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// The chunk text as stored and embedded.
    pub text: String,
    /// Context needed to place the chunk back in its document.
    pub metadata: ChunkMetadata,
}

/// Stable retrieval identity of a chunk: the hex sha256 of its text.
///
/// Re-ingesting identical content yields identical ids, which turns the
/// upsert into a no-op instead of a duplicate.
pub fn chunk_id(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Splits section strings into text chunks.
///
/// Sections are joined with a line break and recursively split on the
/// separator priority list so no chunk exceeds `chunk_size` characters,
/// with `overlap_size` characters of trailing context carried into the next
/// chunk. Two post-passes then run: an all-uppercase chunk is treated as a
/// heading and merged forward into its successor, and consecutive
/// bullet-led chunks coalesce into one list chunk.
pub fn split_sections(sections: &[String], config: &SplitterConfig) -> Vec<Chunk> {
    let text = sections.join("\n");
    if text.trim().is_empty() {
        return Vec::new();
    }

    let raw = split_with_overlap(&text, config);
    let merged = merge_uppercase_headings(raw);
    coalesce_bullets(merged)
        .into_iter()
        .map(|text| Chunk {
            text,
            metadata: ChunkMetadata::text(),
        })
        .collect()
}

/// Splits tables into row-window chunks.
///
/// Rows are the table's non-blank lines and the first row is the header. A
/// table within `chunk_size` rows is kept whole; larger tables are cut into
/// windows of `chunk_size` rows advancing by `chunk_size - overlap_size`,
/// the header prepended to every window to preserve column context.
pub fn split_tables(tables: &[String], config: &SplitterConfig) -> Vec<Chunk> {
    let mut chunks = Vec::new();

    for table in tables {
        let rows: Vec<&str> = table.lines().filter(|row| !row.trim().is_empty()).collect();
        let Some((header, content_rows)) = rows.split_first() else {
            continue;
        };
        let num_rows = content_rows.len();

        if num_rows <= config.chunk_size {
            chunks.push(Chunk {
                text: table.clone(),
                metadata: ChunkMetadata {
                    kind: ChunkKind::Table,
                    header: Some((*header).to_string()),
                    start_row: None,
                    row_count: Some(num_rows),
                },
            });
            continue;
        }

        let mut start = 0;
        while start < num_rows {
            let window = &content_rows[start..(start + config.chunk_size).min(num_rows)];
            let mut text = (*header).to_string();
            for row in window {
                text.push('\n');
                text.push_str(row);
            }
            chunks.push(Chunk {
                text,
                metadata: ChunkMetadata {
                    kind: ChunkKind::Table,
                    header: Some((*header).to_string()),
                    start_row: Some(start + 1),
                    row_count: Some(window.len()),
                },
            });
            start += config.stride();
        }
    }

    chunks
}

/// Recursive character split plus the trailing-overlap pass.
fn split_with_overlap(text: &str, config: &SplitterConfig) -> Vec<String> {
    // Bodies are cut to the stride so that prepending the previous chunk's
    // tail never pushes a chunk past `chunk_size`.
    let raw = split_recursive(text, &SEPARATORS, config.stride());
    if config.overlap_size == 0 || raw.len() < 2 {
        return raw;
    }

    let mut out = Vec::with_capacity(raw.len());
    let mut prev: Option<&str> = None;
    for chunk in &raw {
        match prev {
            None => out.push(chunk.clone()),
            Some(prev) => {
                let tail = char_tail(prev, config.overlap_size);
                out.push(format!("{tail}{chunk}"));
            }
        }
        prev = Some(chunk.as_str());
    }
    out
}

/// The last `n` characters of a string.
fn char_tail(s: &str, n: usize) -> &str {
    let count = s.chars().count();
    if count <= n {
        return s;
    }
    let (idx, _) = s.char_indices().nth(count - n).unwrap_or((0, ' '));
    &s[idx..]
}

/// Splits on the first applicable separator, merging pieces greedily up to
/// `limit` characters and recursing with the remaining separators for any
/// piece that is still too large.
fn split_recursive(text: &str, separators: &[&str], limit: usize) -> Vec<String> {
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }
    let Some((sep, rest)) = separators.split_first() else {
        return hard_cut(text, limit);
    };
    if !text.contains(sep) {
        return split_recursive(text, rest, limit);
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;
    let sep_len = sep.chars().count();

    for part in text.split(sep) {
        let part_len = part.chars().count();

        if part_len > limit {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
                current_len = 0;
            }
            pieces.extend(split_recursive(part, rest, limit));
            continue;
        }

        let joined = if current.is_empty() { part_len } else { current_len + sep_len + part_len };
        if joined > limit && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
            current.push_str(part);
            current_len = part_len;
        } else {
            if !current.is_empty() {
                current.push_str(sep);
            }
            current.push_str(part);
            current_len = joined;
        }
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces.retain(|p| !p.trim().is_empty());
    pieces
}

/// Last-resort cut at exact character offsets.
fn hard_cut(text: &str, limit: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(limit.max(1))
        .map(|window| window.iter().collect())
        .collect()
}

/// True for text whose cased characters are all uppercase (a heading).
fn is_all_uppercase(text: &str) -> bool {
    let mut has_cased = false;
    for c in text.chars() {
        if c.is_lowercase() {
            return false;
        }
        if c.is_uppercase() {
            has_cased = true;
        }
    }
    has_cased
}

/// A chunk consisting entirely of uppercase text is a heading; it absorbs
/// the next chunk instead of standing alone.
fn merge_uppercase_headings(chunks: Vec<String>) -> Vec<String> {
    let mut improved: Vec<String> = Vec::new();
    let mut prev_was_heading = false;
    for chunk in chunks {
        if prev_was_heading {
            if let Some(last) = improved.last_mut() {
                last.push('\n');
                last.push_str(&chunk);
            }
        } else {
            improved.push(chunk.clone());
        }
        prev_was_heading = is_all_uppercase(&chunk);
    }
    improved
}

/// Coalesces consecutive bullet-led chunks into one buffered list chunk,
/// flushed on the next non-bullet chunk or at end of input.
fn coalesce_bullets(chunks: Vec<String>) -> Vec<String> {
    let mut out = Vec::with_capacity(chunks.len());
    let mut buffer = String::new();
    for chunk in chunks {
        let is_bullet = chunk
            .trim_start()
            .chars()
            .next()
            .is_some_and(|c| BULLETS.contains(&c));
        if is_bullet {
            buffer.push('\n');
            buffer.push_str(&chunk);
        } else {
            if !buffer.is_empty() {
                out.push(std::mem::take(&mut buffer));
            }
            out.push(chunk);
        }
    }
    if !buffer.is_empty() {
        out.push(buffer);
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, overlap_size: usize) -> SplitterConfig {
        SplitterConfig {
            chunk_size,
            overlap_size,
        }
    }

    #[test]
    fn chunk_id_is_stable_and_content_derived() {
        assert_eq!(chunk_id("same text"), chunk_id("same text"));
        assert_ne!(chunk_id("same text"), chunk_id("other text"));
        // sha256 renders as 64 hex chars
        assert_eq!(chunk_id("x").len(), 64);
    }

    #[test]
    fn short_text_stays_whole() {
        let chunks = split_sections(&["one short section".to_string()], &config(100, 10));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "one short section");
        assert_eq!(chunks[0].metadata.kind, ChunkKind::Text);
    }

    #[test]
    fn no_text_chunk_exceeds_chunk_size() {
        let body = "word ".repeat(200);
        let sections = vec![body.clone(), body];
        let cfg = config(80, 16);
        for chunk in split_sections(&sections, &cfg) {
            assert!(
                chunk.text.chars().count() <= cfg.chunk_size,
                "chunk of {} chars exceeds {}",
                chunk.text.chars().count(),
                cfg.chunk_size
            );
        }
    }

    #[test]
    fn consecutive_chunks_share_trailing_overlap() {
        let body = (0..40).map(|i| format!("para{i}")).collect::<Vec<_>>().join("\n\n");
        let cfg = config(40, 8);
        let chunks = split_sections(&[body], &cfg);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let prev = &pair[0].text;
            let tail: String = prev
                .chars()
                .skip(prev.chars().count().saturating_sub(cfg.overlap_size))
                .collect();
            assert!(
                pair[1].text.starts_with(&tail),
                "next chunk must begin with the previous chunk's tail"
            );
        }
    }

    #[test]
    fn paragraph_breaks_are_preferred_over_word_cuts() {
        let sections = vec!["first paragraph here\n\nsecond paragraph here".to_string()];
        let chunks = split_sections(&sections, &config(25, 0));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "first paragraph here");
        assert_eq!(chunks[1].text, "second paragraph here");
    }

    #[test]
    fn uppercase_heading_merges_into_next_chunk() {
        let sections = vec!["SAFETY WARNINGS\n\nKeep the unit away from water.".to_string()];
        let chunks = split_sections(&sections, &config(30, 0));
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.starts_with("SAFETY WARNINGS\n"));
        assert!(chunks[0].text.contains("away from water"));
    }

    #[test]
    fn bullet_chunks_coalesce_until_non_bullet() {
        let sections = vec![
            "Features:\n\n- fast indexing\n\n- hybrid scoring\n\n• low memory\n\nSee the manual."
                .to_string(),
        ];
        let chunks = split_sections(&sections, &config(20, 0));
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts.len(), 3, "bullets must fold into one chunk: {texts:?}");
        assert_eq!(texts[0], "Features:");
        assert!(texts[1].contains("- fast indexing"));
        assert!(texts[1].contains("- hybrid scoring"));
        assert!(texts[1].contains("• low memory"));
        assert_eq!(texts[2], "See the manual.");
    }

    #[test]
    fn trailing_bullets_flush_at_end_of_input() {
        let sections = vec!["Intro text\n\n- alpha\n\n- beta".to_string()];
        let chunks = split_sections(&sections, &config(12, 0));
        assert_eq!(chunks.len(), 2);
        assert!(chunks[1].text.contains("- alpha"));
        assert!(chunks[1].text.contains("- beta"));
    }

    #[test]
    fn small_table_is_kept_whole() {
        let table = "name | price\nwidget | 10\ngadget | 20".to_string();
        let chunks = split_tables(&[table.clone()], &config(4, 1));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, table);
        assert_eq!(chunks[0].metadata.kind, ChunkKind::Table);
        assert_eq!(chunks[0].metadata.header.as_deref(), Some("name | price"));
        assert_eq!(chunks[0].metadata.row_count, Some(2));
        assert_eq!(chunks[0].metadata.start_row, None);
    }

    #[test]
    fn ten_row_table_with_chunk_four_overlap_one_yields_four_windows() {
        let mut lines = vec!["h1 | h2".to_string()];
        for i in 0..10 {
            lines.push(format!("r{i} | v{i}"));
        }
        let table = lines.join("\n");

        let chunks = split_tables(&[table], &config(4, 1));
        assert_eq!(chunks.len(), 4);
        for chunk in &chunks {
            assert!(chunk.text.starts_with("h1 | h2\n"), "header must prefix every window");
            assert!(chunk.metadata.row_count.unwrap() <= 4);
        }
        let starts: Vec<usize> = chunks.iter().map(|c| c.metadata.start_row.unwrap()).collect();
        assert_eq!(starts, [1, 4, 7, 10]);
        assert_eq!(chunks[3].metadata.row_count, Some(1));
    }

    #[test]
    fn blank_rows_are_dropped_and_empty_tables_skipped() {
        let table = "header\n\nrow one\n\n\nrow two\n".to_string();
        let chunks = split_tables(&[table, String::new()], &config(10, 2));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].metadata.row_count, Some(2));
    }
}

use crate::error::IngestError;
use crate::models::{IngestionOptions, PdfChunk};
use std::collections::VecDeque;

/// Separators tried in order; the empty separator splits into characters.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl From<&IngestionOptions> for ChunkingConfig {
    fn from(value: &IngestionOptions) -> Self {
        Self {
            chunk_size: value.chunk_size,
            chunk_overlap: value.chunk_overlap,
        }
    }
}

impl ChunkingConfig {
    pub fn validate(&self) -> Result<(), IngestError> {
        if self.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "chunk overlap {} must be smaller than chunk size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Splits `text` into overlapping windows of at most `chunk_size` characters,
/// preferring paragraph, then line, then word boundaries.
pub fn split_text(text: &str, config: ChunkingConfig) -> Result<Vec<String>, IngestError> {
    config.validate()?;
    Ok(split_recursive(text, &SEPARATORS, config))
}

fn split_recursive(text: &str, separators: &[&str], config: ChunkingConfig) -> Vec<String> {
    let (position, separator) = separators
        .iter()
        .enumerate()
        .find(|(_, separator)| separator.is_empty() || text.contains(**separator))
        .map(|(position, separator)| (position, *separator))
        .unwrap_or((separators.len().saturating_sub(1), ""));
    let remaining = separators.get(position + 1..).unwrap_or_default();

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        text.split(separator)
            .filter(|piece| !piece.is_empty())
            .map(str::to_string)
            .collect()
    };

    let mut chunks = Vec::new();
    let mut fitting = Vec::new();

    for piece in pieces {
        if char_len(&piece) < config.chunk_size {
            fitting.push(piece);
            continue;
        }

        if !fitting.is_empty() {
            chunks.extend(merge_splits(&fitting, separator, config));
            fitting.clear();
        }

        if remaining.is_empty() {
            chunks.push(piece);
        } else {
            chunks.extend(split_recursive(&piece, remaining, config));
        }
    }

    if !fitting.is_empty() {
        chunks.extend(merge_splits(&fitting, separator, config));
    }

    chunks
}

fn merge_splits(pieces: &[String], separator: &str, config: ChunkingConfig) -> Vec<String> {
    let separator_len = char_len(separator);
    let mut merged = Vec::new();
    let mut window: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let len = char_len(piece);
        let joiner = if window.is_empty() { 0 } else { separator_len };

        if total + len + joiner > config.chunk_size && !window.is_empty() {
            if let Some(chunk) = join_window(&window, separator) {
                merged.push(chunk);
            }

            while total > config.chunk_overlap
                || (total > 0
                    && total + len + if window.is_empty() { 0 } else { separator_len }
                        > config.chunk_size)
            {
                let Some(first) = window.pop_front() else {
                    break;
                };
                let joiner = if window.is_empty() { 0 } else { separator_len };
                total = total.saturating_sub(char_len(first) + joiner);
            }
        }

        window.push_back(piece);
        total += len + if window.len() > 1 { separator_len } else { 0 };
    }

    if let Some(chunk) = join_window(&window, separator) {
        merged.push(chunk);
    }

    merged
}

fn join_window(window: &VecDeque<&str>, separator: &str) -> Option<String> {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Chunks one page of a document. Returns the chunks and the next global
/// chunk index.
pub fn build_chunks(
    source: &str,
    page: u32,
    page_text: &str,
    options: &IngestionOptions,
    stamp_millis: i64,
    global_index: u64,
) -> Result<(Vec<PdfChunk>, u64), IngestError> {
    let mut cursor = global_index;
    let mut chunks = Vec::new();

    for text in split_text(page_text, ChunkingConfig::from(options))? {
        chunks.push(PdfChunk {
            chunk_id: make_chunk_id(source, page, stamp_millis, cursor),
            source: source.to_string(),
            page,
            chunk_index: cursor,
            text,
        });
        cursor = cursor.saturating_add(1);
    }

    Ok((chunks, cursor))
}

/// Record ids must be ASCII; non-ASCII characters of `source` are dropped.
/// The full file name stays in the chunk metadata.
fn make_chunk_id(source: &str, page: u32, stamp_millis: i64, index: u64) -> String {
    let ascii_source: String = source.chars().filter(char::is_ascii).collect();
    format!("{ascii_source}-{page}-{stamp_millis}-{index}")
}

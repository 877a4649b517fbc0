//! PDF ingestion pipeline: page text extraction, chunking, embedding, storage.

use std::sync::Arc;

use crate::config::{CHUNK_OVERLAP, CHUNK_SIZE};
use crate::core::errors::ApiError;
use crate::llm::provider::EmbeddingProvider;
use crate::retrieval::sqlite::{ChunkRecord, SqliteVectorStore};

/// Text of one PDF page, with its 1-based page label.
#[derive(Debug, Clone)]
pub struct PageText {
    pub page_label: String,
    pub text: String,
}

/// Extract per-page text from an in-memory PDF.
pub fn extract_pdf_pages(data: &[u8]) -> Result<Vec<PageText>, ApiError> {
    let doc = lopdf::Document::load_mem(data)
        .map_err(|e| ApiError::BadRequest(format!("Failed to parse PDF: {}", e)))?;

    let mut pages = Vec::new();
    for (&page_number, _) in doc.get_pages().iter() {
        let text = doc.extract_text(&[page_number]).unwrap_or_default();
        if text.trim().is_empty() {
            continue;
        }
        pages.push(PageText {
            page_label: page_number.to_string(),
            text,
        });
    }
    Ok(pages)
}

/// Split text into overlapping character chunks, breaking at whitespace
/// where possible.
pub fn split_into_chunks(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }
    if chars.len() <= chunk_size {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let mut end = (start + chunk_size).min(chars.len());

        // Back up to the nearest whitespace so words stay intact.
        if end < chars.len() {
            if let Some(offset) = chars[start..end]
                .iter()
                .rposition(|c| c.is_whitespace())
            {
                if offset > chunk_size / 2 {
                    end = start + offset;
                }
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let trimmed = chunk.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        if end == chars.len() {
            break;
        }
        // Next window starts `overlap` characters before this one ended.
        start = end.saturating_sub(overlap).max(start + 1);
    }

    chunks
}

/// Parse, chunk, embed and store one uploaded PDF scoped to an identity.
pub async fn ingest_pdf(
    data: &[u8],
    filename: &str,
    user_id: &str,
    thread_id: &str,
    embedder: Arc<dyn EmbeddingProvider>,
    store: &SqliteVectorStore,
) -> Result<usize, ApiError> {
    let pages = extract_pdf_pages(data)?;

    let mut records = Vec::new();
    for page in &pages {
        for chunk in split_into_chunks(&page.text, CHUNK_SIZE, CHUNK_OVERLAP) {
            records.push(ChunkRecord {
                content: chunk,
                page_label: page.page_label.clone(),
                user_id: user_id.to_string(),
                thread_id: thread_id.to_string(),
                source: filename.to_string(),
            });
        }
    }

    if records.is_empty() {
        return Ok(0);
    }

    let texts: Vec<String> = records.iter().map(|r| r.content.clone()).collect();
    let embeddings = embedder.embed(&texts).await?;
    if embeddings.len() != records.len() {
        return Err(ApiError::Upstream(format!(
            "embedder returned {} vectors for {} chunks",
            embeddings.len(),
            records.len()
        )));
    }

    let count = records.len();
    store
        .insert_batch(records.into_iter().zip(embeddings).collect())
        .await?;

    tracing::info!(
        "Ingested {} chunks from {} for user={} thread={}",
        count,
        filename,
        user_id,
        thread_id
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = split_into_chunks("hello world", 600, 100);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn long_text_produces_overlapping_chunks() {
        let word = "alpha ";
        let text = word.repeat(300); // 1800 chars
        let chunks = split_into_chunks(&text, 600, 100);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.chars().count() <= 600);
            assert!(!chunk.is_empty());
        }
    }

    #[test]
    fn chunk_boundaries_fall_on_whitespace() {
        let text = "word ".repeat(500);
        let chunks = split_into_chunks(&text, 600, 100);
        for chunk in chunks {
            assert!(chunk.starts_with("word"));
            assert!(chunk.ends_with("word"));
        }
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_into_chunks("", 600, 100).is_empty());
        assert!(split_into_chunks("   \n  ", 600, 100).is_empty());
    }
}

//! Fixed-width text chunking with overlap.

use policy_core::{AppError, AppResult};

/// Split `text` into overlapping windows of at most `chunk_size` characters.
///
/// Each window starts `chunk_size - overlap` characters after the previous
/// one. The last window ends exactly at the end of the text. Windows are
/// measured in `char`s, so multi-byte text is never split inside a code
/// point.
///
/// Empty text yields no chunks. Any nonempty text yields at least one.
///
/// # Errors
/// Returns `AppError::Config` when `chunk_size` is zero or `overlap` is not
/// smaller than `chunk_size`.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> AppResult<Vec<&str>> {
    if chunk_size == 0 {
        return Err(AppError::Config("chunk_size must be positive".to_string()));
    }
    if overlap >= chunk_size {
        return Err(AppError::Config(format!(
            "overlap ({}) must be smaller than chunk_size ({})",
            overlap, chunk_size
        )));
    }

    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Byte offset of every char boundary, including the end of the text
    let boundaries: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let char_len = boundaries.len() - 1;
    let step = chunk_size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;

    loop {
        let end = (start + chunk_size).min(char_len);
        chunks.push(&text[boundaries[start]..boundaries[end]]);

        if end == char_len {
            break;
        }
        start += step;
    }

    tracing::debug!(
        "Chunked {} chars into {} chunks (size: {}, overlap: {})",
        char_len,
        chunks.len(),
        chunk_size,
        overlap
    );

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_chunk_text_basic() {
        let text = "a".repeat(1000);
        let chunks = chunk_text(&text, 200, 50).unwrap();

        assert_eq!(chunks.len(), 7);
        assert!(chunks.iter().all(|c| c.chars().count() <= 200));
    }

    #[test]
    fn test_chunk_text_no_overlap() {
        let text = "a".repeat(300);
        let chunks = chunk_text(&text, 100, 0).unwrap();

        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_chunk_text_empty() {
        assert!(chunk_text("", 100, 10).unwrap().is_empty());
    }

    #[test]
    fn test_fifteen_hundred_chars() {
        let text: String = (0..1500).map(|i| (b'a' + (i % 26) as u8) as char).collect();
        let chunks = chunk_text(&text, 1000, 100).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], &text[0..1000]);
        assert_eq!(chunks[1], &text[900..1500]);
    }

    #[test]
    fn test_short_text_is_single_chunk() {
        assert_eq!(chunk_text("hi", 1000, 100).unwrap(), vec!["hi"]);
    }

    #[test]
    fn test_multibyte_text() {
        let text = "férias é um direito 🎉".repeat(20);
        let chunks = chunk_text(&text, 30, 5).unwrap();

        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.chars().count() <= 30));
    }

    #[test]
    fn test_invalid_overlap_rejected() {
        assert!(matches!(
            chunk_text("text", 100, 100),
            Err(AppError::Config(_))
        ));
        assert!(chunk_text("text", 0, 0).is_err());
    }

    fn expected_count(len: usize, size: usize, overlap: usize) -> usize {
        if len == 0 {
            0
        } else if len <= overlap {
            1
        } else {
            (len - overlap).div_ceil(size - overlap)
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn chunks_reconstruct_text(
            text in "[a-zA-Z0-9 éü🎉\n]{0,400}",
            size in 1usize..60,
            overlap_seed in 0usize..60,
        ) {
            let overlap = overlap_seed % size;
            let chunks = chunk_text(&text, size, overlap).unwrap();

            let mut rebuilt = String::new();
            for (i, chunk) in chunks.iter().enumerate() {
                if i == 0 {
                    rebuilt.push_str(chunk);
                } else {
                    rebuilt.extend(chunk.chars().skip(overlap));
                }
            }

            prop_assert_eq!(rebuilt, text);
        }

        #[test]
        fn chunk_count_matches_formula(
            text in "[a-z ]{0,500}",
            size in 1usize..80,
            overlap_seed in 0usize..80,
        ) {
            let overlap = overlap_seed % size;
            let chunks = chunk_text(&text, size, overlap).unwrap();

            prop_assert_eq!(chunks.len(), expected_count(text.chars().count(), size, overlap));
        }
    }
}

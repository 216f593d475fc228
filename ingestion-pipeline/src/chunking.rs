use common::error::AppError;

/// Splits text into overlapping character windows.
///
/// Windows hold at most `chunk_size` chars and the start advances by
/// `chunk_size - overlap` each step, so consecutive windows share `overlap`
/// chars. Whitespace-only windows are skipped. The iterator is lazy and
/// holds no state between calls; calling `chunk` again restarts from the
/// top.
///
/// `overlap >= chunk_size` would make the advance step zero or negative, so
/// it is rejected up front instead of looping forever.
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> Result<Chunks<'_>, AppError> {
    if chunk_size == 0 {
        return Err(AppError::Validation(
            "chunk_size must be greater than zero".into(),
        ));
    }
    if overlap >= chunk_size {
        return Err(AppError::Validation(format!(
            "chunk overlap {overlap} must be smaller than chunk size {chunk_size}"
        )));
    }

    // Byte offset of every char boundary, plus the end of the text, so
    // windows can slice without re-walking the string.
    let mut boundaries: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
    boundaries.push(text.len());

    Ok(Chunks {
        text,
        boundaries,
        chunk_size,
        step: chunk_size - overlap,
        start: 0,
    })
}

#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    boundaries: Vec<usize>,
    chunk_size: usize,
    step: usize,
    start: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let char_count = self.boundaries.len() - 1;

        while self.start < char_count {
            let end = (self.start + self.chunk_size).min(char_count);
            let window = &self.text[self.boundaries[self.start]..self.boundaries[end]];
            self.start += self.step;

            if !window.trim().is_empty() {
                return Some(window);
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_yields_no_chunks() {
        let chunks: Vec<&str> = chunk("", 500, 50).expect("valid bounds").collect();
        assert!(chunks.is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks: Vec<&str> = chunk("hello world", 500, 50).expect("valid bounds").collect();
        assert_eq!(chunks, vec!["hello world"]);
    }

    #[test]
    fn windows_advance_by_size_minus_overlap_and_cover_the_text() {
        let text = "abcdefghij"; // 10 chars
        let chunks: Vec<&str> = chunk(text, 4, 1).expect("valid bounds").collect();

        // starts at 0, 3, 6, 9
        assert_eq!(chunks, vec!["abcd", "defg", "ghij", "j"]);

        // consecutive chunks share exactly `overlap` chars
        for pair in chunks.windows(2) {
            assert!(pair[1].starts_with(&pair[0][pair[0].len() - 1..]));
        }
        assert!(chunks.last().map(|last| text.ends_with(last)).unwrap_or(false));
    }

    #[test]
    fn no_chunk_is_empty_or_whitespace_only() {
        let text = "abc          def";
        let chunks: Vec<&str> = chunk(text, 4, 0).expect("valid bounds").collect();

        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|window| !window.trim().is_empty()));
        // the all-whitespace middle window is dropped
        assert!(chunks.iter().all(|window| window.len() <= 4));
    }

    #[test]
    fn overlap_equal_to_size_fails_fast() {
        let err = chunk("some text", 50, 50).expect_err("must reject");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn overlap_above_size_fails_fast() {
        let err = chunk("some text", 10, 20).expect_err("must reject");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn zero_chunk_size_fails_fast() {
        let err = chunk("some text", 0, 0).expect_err("must reject");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn windows_respect_char_boundaries_in_multibyte_text() {
        let text = "héllo wörld ünïcode";
        let chunks: Vec<&str> = chunk(text, 5, 2).expect("valid bounds").collect();

        assert!(!chunks.is_empty());
        for window in &chunks {
            assert!(window.chars().count() <= 5);
        }
    }

    #[test]
    fn iterator_restarts_from_the_top_on_a_fresh_call() {
        let first: Vec<&str> = chunk("abcdefghij", 4, 1).expect("valid bounds").collect();
        let second: Vec<&str> = chunk("abcdefghij", 4, 1).expect("valid bounds").collect();
        assert_eq!(first, second);
    }
}

//! Overlapping fixed-size chunking measured in characters (Unicode scalar values).
//!
//! Consecutive chunks always share exactly `overlap` characters, so dropping the
//! first `overlap` characters of every chunk after the first gives back the
//! input text. With boundary preference on, a chunk may end early at the last
//! paragraph break, sentence end, or whitespace inside its window.

use kbchat_core::error::{codes, AppError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    size: usize,
    overlap: usize,
    prefer_boundaries: bool,
}

/// A chunk borrowed from the raw text. `start`/`end` are character offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextChunk<'a> {
    pub ordinal: u32,
    pub start: usize,
    pub end: usize,
    pub text: &'a str,
}

impl TextChunk<'_> {
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

impl Chunker {
    pub fn new(size: usize, overlap: usize, prefer_boundaries: bool) -> Result<Self, AppError> {
        if size == 0 || overlap >= size {
            return Err(AppError::new(
                codes::CONFIG_INVALID,
                "Chunk overlap must be smaller than chunk size",
            )
            .with_details(format!("size={size}; overlap={overlap}")));
        }
        Ok(Self {
            size,
            overlap,
            prefer_boundaries,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Lazily split `text`. The iterator is `Clone`, so a sequence can be replayed.
    pub fn chunks<'a>(&self, text: &'a str) -> Chunks<'a> {
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());
        Chunks {
            text,
            offsets,
            chunker: *self,
            next_start: if text.is_empty() { None } else { Some(0) },
            ordinal: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    text: &'a str,
    /// Byte offset of every char, plus `text.len()` as the final entry.
    offsets: Vec<usize>,
    chunker: Chunker,
    next_start: Option<usize>,
    ordinal: u32,
}

impl<'a> Chunks<'a> {
    fn char_count(&self) -> usize {
        self.offsets.len() - 1
    }

    fn slice(&self, start: usize, end: usize) -> &'a str {
        &self.text[self.offsets[start]..self.offsets[end]]
    }

    /// Best cut in `(start + overlap, start + size]`: paragraph, then sentence, then word.
    fn natural_end(&self, start: usize) -> Option<usize> {
        let Chunker { size, overlap, .. } = self.chunker;
        let window: Vec<char> = self.slice(start, start + size).chars().collect();
        // `cut` is the exclusive end of the chunk, relative to `start`.
        let cuts = || (overlap + 1..=size).rev();

        let paragraph = cuts().find(|&cut| cut >= 2 && window[cut - 2] == '\n' && window[cut - 1] == '\n');
        let sentence = || {
            cuts().find(|&cut| {
                cut >= 2 && window[cut - 1].is_whitespace() && matches!(window[cut - 2], '.' | '!' | '?')
            })
        };
        let word = || cuts().find(|&cut| window[cut - 1].is_whitespace());

        paragraph
            .or_else(sentence)
            .or_else(word)
            .map(|cut| start + cut)
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = TextChunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        let total = self.char_count();

        let end = if total - start <= self.chunker.size {
            self.next_start = None;
            total
        } else {
            let hard = start + self.chunker.size;
            let end = if self.chunker.prefer_boundaries {
                self.natural_end(start).unwrap_or(hard)
            } else {
                hard
            };
            self.next_start = Some(end - self.chunker.overlap);
            end
        };

        let chunk = TextChunk {
            ordinal: self.ordinal,
            start,
            end,
            text: self.slice(start, end),
        };
        self.ordinal += 1;
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reassemble(chunks: &[TextChunk<'_>], overlap: usize) -> String {
        let mut out = String::new();
        for (i, c) in chunks.iter().enumerate() {
            if i == 0 {
                out.push_str(c.text);
            } else {
                out.extend(c.text.chars().skip(overlap));
            }
        }
        out
    }

    fn sample_texts() -> Vec<String> {
        vec![
            String::new(),
            "short".to_string(),
            "x".repeat(1000),
            "y".repeat(1001),
            "z".repeat(3457),
            "The quick brown fox. Jumps over the lazy dog! Again? ".repeat(60),
            "Paragraph one is here.\n\nParagraph two follows.\n\n".repeat(40),
            "héllo wörld ✓ 日本語のテキスト ".repeat(80),
        ]
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(Chunker::new(100, 100, true).is_err());
        assert!(Chunker::new(0, 0, true).is_err());
        assert!(Chunker::new(100, 0, true).is_ok());
    }

    #[test]
    fn splits_1500_chars_into_two_overlapping_chunks() {
        let text: String = (0..1500).map(|i| char::from(b'a' + (i % 26) as u8)).collect();
        for prefer in [true, false] {
            let chunker = Chunker::new(1000, 200, prefer).unwrap();
            let chunks: Vec<_> = chunker.chunks(&text).collect();
            assert_eq!(chunks.len(), 2);
            assert_eq!((chunks[0].start, chunks[0].end), (0, 1000));
            assert_eq!((chunks[1].start, chunks[1].end), (800, 1500));
            assert_eq!(chunks[0].text, &text[..1000]);
            assert_eq!(chunks[1].text, &text[800..]);
        }
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunker = Chunker::new(1000, 200, true).unwrap();
        let long = "q".repeat(1000);
        for text in ["a", "hello world", long.as_str()] {
            let chunks: Vec<_> = chunker.chunks(text).collect();
            assert_eq!(chunks.len(), 1);
            assert_eq!(chunks[0].text, text);
        }
        assert_eq!(chunker.chunks("").count(), 0);
    }

    #[test]
    fn reassembly_reproduces_input_for_all_settings() {
        for text in sample_texts() {
            for (size, overlap) in [(1000, 200), (50, 0), (50, 49), (7, 3), (1, 0)] {
                for prefer in [true, false] {
                    let chunker = Chunker::new(size, overlap, prefer).unwrap();
                    let chunks: Vec<_> = chunker.chunks(&text).collect();
                    assert_eq!(
                        reassemble(&chunks, overlap),
                        text,
                        "size={size} overlap={overlap} prefer={prefer}"
                    );
                    for c in &chunks {
                        assert!(c.char_len() <= size);
                        assert_eq!(c.text.chars().count(), c.char_len());
                    }
                }
            }
        }
    }

    #[test]
    fn consecutive_chunks_share_exact_overlap() {
        let text = "The quick brown fox. Jumps over the lazy dog! ".repeat(100);
        let chunker = Chunker::new(300, 50, true).unwrap();
        let chunks: Vec<_> = chunker.chunks(&text).collect();
        assert!(chunks.len() > 2);
        for pair in chunks.windows(2) {
            assert_eq!(pair[1].start, pair[0].end - 50);
        }
    }

    #[test]
    fn hard_cuts_are_exactly_size_except_last() {
        let text = "word ".repeat(500);
        let chunker = Chunker::new(128, 32, false).unwrap();
        let chunks: Vec<_> = chunker.chunks(&text).collect();
        let (last, rest) = chunks.split_last().unwrap();
        assert!(rest.iter().all(|c| c.char_len() == 128));
        assert!(last.char_len() <= 128);
    }

    #[test]
    fn prefers_paragraph_then_sentence_then_word_boundaries() {
        let chunker = Chunker::new(40, 5, true).unwrap();

        let para = format!("{}\n\n{}", "a".repeat(20), "b".repeat(40));
        let first = chunker.chunks(&para).next().unwrap();
        assert!(first.text.ends_with("\n\n"));

        let sentence = format!("{} done. {} more words here", "a".repeat(10), "c".repeat(30));
        let first = chunker.chunks(&sentence).next().unwrap();
        assert!(first.text.ends_with("done. "), "got {:?}", first.text);

        let words = format!("{} {}", "a".repeat(30), "b".repeat(30));
        let first = chunker.chunks(&words).next().unwrap();
        assert_eq!(first.text, format!("{} ", "a".repeat(30)));
    }

    #[test]
    fn iterator_is_restartable() {
        let text = "z".repeat(2500);
        let chunker = Chunker::new(1000, 200, true).unwrap();
        let it = chunker.chunks(&text);
        let a: Vec<_> = it.clone().collect();
        let b: Vec<_> = it.collect();
        assert_eq!(a, b);
        assert_eq!(a.iter().map(|c| c.ordinal).collect::<Vec<_>>(), vec![0, 1, 2]);
    }
}

use super::*;

fn overlap_of(left: &str, right: &str, overlap: usize) -> (String, String) {
    let tail: String = left
        .chars()
        .skip(left.chars().count() - overlap)
        .collect();
    let head: String = right.chars().take(overlap).collect();
    (tail, head)
}

#[test]
fn empty_text_produces_no_chunks() {
    let splitter = TextSplitter::new(100, 10).expect("valid splitter");
    assert!(splitter.split("").is_empty());

    let document = Document::new("empty.txt", "");
    assert!(splitter.split_document(&document).is_empty());
}

#[test]
fn short_text_is_a_single_chunk() {
    let splitter = TextSplitter::new(1000, 200).expect("valid splitter");
    let chunks = splitter.split("This is a short text.");
    assert_eq!(chunks, vec!["This is a short text.".to_string()]);

    // Exactly chunk_size characters still fits in one window
    let exact = "x".repeat(1000);
    assert_eq!(splitter.split(&exact).len(), 1);
}

#[test]
fn degenerate_parameters_fail_fast() {
    assert!(matches!(
        TextSplitter::new(100, 100),
        Err(RagError::Config(_))
    ));
    assert!(matches!(
        TextSplitter::new(100, 150),
        Err(RagError::Config(_))
    ));
    assert!(matches!(TextSplitter::new(0, 0), Err(RagError::Config(_))));
    assert!(split_text("some text", 10, 10).is_err());
}

#[test]
fn chunk_count_matches_formula() {
    let splitter = TextSplitter::new(1000, 200).expect("valid splitter");

    for len in [1001_usize, 1600, 1800, 1801, 2500, 10_000] {
        let text: String = (0..len)
            .map(|i| char::from(b'a' + u8::try_from(i % 26).expect("fits in u8")))
            .collect();
        let chunks = splitter.split(&text);
        let expected = (len - 200).div_ceil(800);

        assert_eq!(chunks.len(), expected, "length {len}");
        assert_eq!(splitter.expected_chunk_count(len), expected);
    }
}

#[test]
fn consecutive_chunks_overlap_exactly() {
    let splitter = TextSplitter::new(50, 12).expect("valid splitter");
    let text = "The quick brown fox jumps over the lazy dog. ".repeat(20);
    let chunks = splitter.split(&text);

    assert!(chunks.len() > 2);
    for pair in chunks.windows(2) {
        let (tail, head) = overlap_of(&pair[0], &pair[1], 12);
        assert_eq!(tail, head);
    }
    for chunk in &chunks {
        assert!(chunk.chars().count() <= 50);
    }
}

#[test]
fn chunks_reassemble_original_text() {
    let splitter = TextSplitter::new(64, 16).expect("valid splitter");
    let text = "Lorem ipsum dolor sit amet, consectetur adipiscing elit. ".repeat(9);
    let chunks = splitter.split(&text);

    let mut rebuilt = chunks[0].clone();
    for chunk in &chunks[1..] {
        rebuilt.extend(chunk.chars().skip(16));
    }
    assert_eq!(rebuilt, text);
}

#[test]
fn windows_count_characters_not_bytes() {
    let splitter = TextSplitter::new(4, 1).expect("valid splitter");
    let chunks = splitter.split("ééééééé");

    assert_eq!(chunks, vec!["éééé".to_string(), "éééé".to_string()]);
}

#[test]
fn document_metadata_is_copied_to_every_chunk() {
    let splitter = TextSplitter::new(20, 5).expect("valid splitter");
    let document = Document::new("A.txt", "a".repeat(100)).with_metadata("kind", "report");

    let chunks = splitter.split_document(&document);

    assert_eq!(chunks.len(), splitter.expected_chunk_count(100));
    for chunk in &chunks {
        assert_eq!(chunk.source, "A.txt");
        assert_eq!(chunk.metadata.get(SOURCE_KEY).map(String::as_str), Some("A.txt"));
        assert_eq!(chunk.metadata.get("kind").map(String::as_str), Some("report"));
        assert!(chunk.char_len() <= 20);
    }
}

#[test]
fn document_from_path_uses_basename() {
    let document = Document::from_path(Path::new("/tmp/uploads/report.pdf"), "text");
    assert_eq!(document.source, "report.pdf");
    assert_eq!(
        document.metadata.get(SOURCE_KEY).map(String::as_str),
        Some("report.pdf")
    );
}

#[test]
fn chunking_config_drives_splitter() {
    let config = ChunkingConfig {
        chunk_size: 10,
        chunk_overlap: 3,
    };
    let splitter = TextSplitter::from_config(&config).expect("valid config");
    assert_eq!(splitter.chunk_size(), 10);
    assert_eq!(splitter.chunk_overlap(), 3);
    assert_eq!(splitter.step(), 7);
}

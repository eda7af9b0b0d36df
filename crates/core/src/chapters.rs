//! Automatic chapter division for generated stories.

use crate::ai_response::GeneratedChapter;
use crate::types::DbId;

/// Target number of scenes per automatically created chapter.
pub const SCENES_PER_CHAPTER: usize = 3;

/// Split prose into sentences on `.`, `!` or `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let terminal = matches!(c, '.' | '!' | '?');
        let boundary = chars.peek().is_none_or(|next| next.is_whitespace());
        if terminal && boundary {
            let sentence = current.trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            current.clear();
        }
    }

    let rest = current.trim();
    if !rest.is_empty() {
        sentences.push(rest.to_string());
    }
    sentences
}

/// Divide `content` and `scene_ids` into roughly three-scene chapters.
///
/// Produces `max(1, scenes / 3)` chapters. Sentences are dealt out evenly and
/// the last chapter takes any remainder; scene `j` lands in chapter `i` when
/// `i * n / c <= j < (i + 1) * n / c`.
pub fn auto_chapters(scene_ids: &[DbId], content: &str) -> Vec<GeneratedChapter> {
    let scene_count = scene_ids.len();
    let chapter_count = (scene_count / SCENES_PER_CHAPTER).max(1);

    let sentences = split_sentences(content);
    let per_chapter = (sentences.len() / chapter_count).max(1);

    (0..chapter_count)
        .map(|i| {
            let start = (i * per_chapter).min(sentences.len());
            let end = if i + 1 == chapter_count {
                sentences.len()
            } else {
                (start + per_chapter).min(sentences.len())
            };

            let scene_start = i * scene_count / chapter_count;
            let scene_end = (i + 1) * scene_count / chapter_count;

            GeneratedChapter {
                title: format!("Chapter {}", i + 1),
                content: sentences[start..end].join(" "),
                scenes: scene_ids[scene_start..scene_end].to_vec(),
            }
        })
        .collect()
}

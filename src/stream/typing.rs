//! Natural-typing generator (§4.4): splits a `think` string into word-like
//! fragments, each carrying a delay calibrated by character class, so the
//! stream reads like something being typed rather than dumped in one shot.

use std::time::Duration;

const BASE_WORD_DELAY_MS: u64 = 18;
const MAX_WORD_DELAY_MS: u64 = 90;
const CJK_CHAR_DELAY_MS: u64 = 110;
const PUNCTUATION_DELAY_MS: u64 = 240;
const SENTENCE_START_EXTRA_MS: u64 = 70;
const BURST_THRESHOLD_FRAGMENTS: u32 = 3;
const BURST_SHORT_FRAGMENT_LEN: usize = 3;
const BURST_DELAY_DIVISOR: u64 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct TypingFragment {
    pub text: String,
    pub delay: Duration,
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x4E00..=0x9FFF | 0x3040..=0x30FF | 0xAC00..=0xD7A3)
}

fn is_punctuation_run(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| c.is_ascii_punctuation())
}

fn is_url_run(word: &str) -> bool {
    word.starts_with("http://") || word.starts_with("https://")
}

fn starts_with_uppercase(word: &str) -> bool {
    word.chars().next().map(char::is_uppercase).unwrap_or(false)
}

/// Split `text` on whitespace, classify each run, and attach a pacing delay.
/// CJK runs are exploded into one fragment per codepoint — each carries
/// comparatively more information than a Latin word of the same byte length.
pub fn naturalize(text: &str) -> Vec<TypingFragment> {
    let mut fragments = Vec::new();
    let mut consecutive_short: u32 = 0;

    for word in text.split_whitespace() {
        if word.chars().any(is_cjk) {
            for c in word.chars() {
                fragments.push(classify_and_pace(
                    &c.to_string(),
                    CJK_CHAR_DELAY_MS,
                    &mut consecutive_short,
                ));
            }
            continue;
        }

        let base_delay_ms = if is_url_run(word) {
            BASE_WORD_DELAY_MS
        } else if is_punctuation_run(word) {
            PUNCTUATION_DELAY_MS
        } else {
            let scaled = BASE_WORD_DELAY_MS + word.len() as u64 * 4;
            let mut delay = scaled.min(MAX_WORD_DELAY_MS);
            if starts_with_uppercase(word) {
                delay += SENTENCE_START_EXTRA_MS;
            }
            delay
        };

        fragments.push(classify_and_pace(word, base_delay_ms, &mut consecutive_short));
    }

    fragments
}

fn classify_and_pace(
    fragment: &str,
    base_delay_ms: u64,
    consecutive_short: &mut u32,
) -> TypingFragment {
    let is_short = fragment.chars().count() <= BURST_SHORT_FRAGMENT_LEN;
    if is_short {
        *consecutive_short += 1;
    } else {
        *consecutive_short = 0;
    }

    let delay_ms = if *consecutive_short > BURST_THRESHOLD_FRAGMENTS {
        base_delay_ms / BURST_DELAY_DIVISOR
    } else {
        base_delay_ms
    };

    TypingFragment {
        text: fragment.to_string(),
        delay: Duration::from_millis(delay_ms),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_whitespace_preserving_word_order() {
        let fragments = naturalize("hello world");
        let words: Vec<&str> = fragments.iter().map(|f| f.text.as_str()).collect();
        assert_eq!(words, vec!["hello", "world"]);
    }

    #[test]
    fn url_runs_stay_as_a_single_fragment_with_short_delay() {
        let fragments = naturalize("see https://example.com/a for more");
        let url_fragment = fragments.iter().find(|f| f.text.starts_with("http")).unwrap();
        assert_eq!(url_fragment.text, "https://example.com/a");
        assert_eq!(url_fragment.delay, Duration::from_millis(BASE_WORD_DELAY_MS));
    }

    #[test]
    fn cjk_words_are_exploded_into_one_fragment_per_codepoint() {
        let fragments = naturalize("你好 world");
        assert_eq!(fragments[0].text, "你");
        assert_eq!(fragments[1].text, "好");
        assert_eq!(fragments[0].delay, Duration::from_millis(CJK_CHAR_DELAY_MS));
    }

    #[test]
    fn punctuation_runs_get_a_longer_pause() {
        let fragments = naturalize("wait . . .");
        let dot = fragments.iter().find(|f| f.text == ".").unwrap();
        assert!(dot.delay >= Duration::from_millis(PUNCTUATION_DELAY_MS / 2));
    }

    #[test]
    fn burst_mode_shortens_delay_after_three_short_fragments() {
        let fragments = naturalize("a b c d e");
        // Fragments 1-3 ("a","b","c") build the streak; from the 4th ("d")
        // onward burst mode should have kicked in and halved the delay.
        assert!(fragments[4].delay < fragments[0].delay);
    }

    #[test]
    fn sentence_start_capitalization_adds_extra_delay() {
        let fragments = naturalize("Hello there");
        let lowercase_variant = naturalize("hello there");
        assert!(fragments[0].delay > lowercase_variant[0].delay);
    }
}

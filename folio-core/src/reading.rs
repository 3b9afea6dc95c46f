use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
pub struct ReadingTime {
    pub minutes: f64,
    pub words: usize,
}

impl ReadingTime {
    pub fn estimate(text: &str, words_per_minute: u32) -> Self {
        let words = count_words(text);
        let wpm = words_per_minute.max(1) as f64;
        let minutes = (words as f64 / wpm * 100.0).round() / 100.0;
        Self {
            // a handful of words still reads as a non-zero estimate
            minutes: if words > 0 { minutes.max(0.01) } else { 0.0 },
            words,
        }
    }

    /// Whole minutes for display, at least one.
    pub fn display_minutes(&self) -> u64 {
        self.minutes.ceil().max(1.0) as u64
    }
}

/// Count words, treating every CJK character as a word of its own.
pub fn count_words(text: &str) -> usize {
    let mut count = 0;
    let mut in_word = false;

    for c in text.chars() {
        if is_cjk(c) {
            count += 1;
            in_word = false;
        } else if c.is_alphanumeric() {
            if !in_word {
                count += 1;
                in_word = true;
            }
        } else if c.is_whitespace() {
            in_word = false;
        }
    }

    count
}

fn is_cjk(c: char) -> bool {
    matches!(c as u32,
        0x3040..=0x30FF     // kana
        | 0x3400..=0x4DBF   // CJK extension A
        | 0x4E00..=0x9FFF   // CJK unified
        | 0xAC00..=0xD7AF   // hangul
        | 0xF900..=0xFAFF   // compatibility ideographs
        | 0x20000..=0x2FA1F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_count_words() {
        assert_eq!(count_words("Managing configuration files across servers"), 5);
        assert_eq!(count_words("Ansible's lineinfile, module!"), 3);
        assert_eq!(count_words("-- * --"), 0);
        assert_eq!(count_words("配置管理 with Ansible"), 6);
        assert_eq!(count_words(""), 0);
    }

    #[test]
    fn test_estimate() {
        let text = "word ".repeat(600);
        let rt = ReadingTime::estimate(&text, 300);
        assert_eq!(rt.words, 600);
        assert_eq!(rt.minutes, 2.0);
        assert_eq!(rt.display_minutes(), 2);

        let short = ReadingTime::estimate("hi", 300);
        assert!(short.minutes > 0.0);
        assert_eq!(short.display_minutes(), 1);

        let empty = ReadingTime::estimate("", 300);
        assert_eq!(empty.words, 0);
        assert_eq!(empty.minutes, 0.0);
    }
}

//! Callsign extraction from recognizer transcripts
//!
//! Two passes over the text: a direct regex match on the raw transcript,
//! then a rewrite of ITU phonetic words (Alpha..Zulu plus the variants
//! operators actually say) into letters and digits followed by a re-match.
//! Candidates are filtered through a validity heuristic tuned to reject
//! common recognizer confusions.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

/// Callsign syntax: 1-2 letters, 1-2 digits, 1-4 letters
static CALLSIGN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[A-Z]{1,2}\d{1,2}[A-Z]{1,4}\b").expect("callsign pattern compiles")
});

/// Substrings that mark a candidate as a recognizer confusion
const BANNED: [&str; 5] = ["HELLO", "OVER", "ROGER", "COPY", "BREAK"];

/// How a callsign was found in the transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionMethod {
    /// Matched verbatim in the raw transcript
    Direct,
    /// Matched after phonetic-alphabet rewriting
    Phonetic,
}

/// A validated callsign candidate
#[derive(Debug, Clone, PartialEq)]
pub struct Callsign {
    /// Upper-cased callsign text
    pub text: String,
    /// Extraction confidence in [0, 1]
    pub confidence: f32,
    /// Which pass produced it
    pub method: ExtractionMethod,
}

/// Extract validated callsigns from a transcript.
///
/// Direct matches (confidence 0.90) come first in transcript order, then
/// phonetic matches not already found (confidence 0.70) in rewritten-text
/// order. The result contains no duplicates.
pub fn extract(transcript: &str) -> Vec<Callsign> {
    let mut found = Vec::new();
    let mut seen = HashSet::new();

    for m in CALLSIGN_RE.find_iter(transcript) {
        let text = m.as_str().to_ascii_uppercase();
        if is_valid(&text) && seen.insert(text.clone()) {
            found.push(Callsign {
                text,
                confidence: 0.90,
                method: ExtractionMethod::Direct,
            });
        }
    }

    let rewritten = rewrite_phonetics(transcript);
    for m in CALLSIGN_RE.find_iter(&rewritten) {
        let text = m.as_str().to_ascii_uppercase();
        if is_valid(&text) && seen.insert(text.clone()) {
            found.push(Callsign {
                text,
                confidence: 0.70,
                method: ExtractionMethod::Phonetic,
            });
        }
    }

    found
}

/// Validity heuristic for a candidate (upper-cased).
///
/// Length 4-7, at least one digit, letters at both ends, and none of the
/// banned filler words embedded in it.
pub fn is_valid(candidate: &str) -> bool {
    let len = candidate.chars().count();
    if !(4..=7).contains(&len) {
        return false;
    }
    if !candidate.chars().any(|c| c.is_ascii_digit()) {
        return false;
    }
    let first = candidate.chars().next();
    let last = candidate.chars().last();
    if !first.is_some_and(|c| c.is_ascii_alphabetic())
        || !last.is_some_and(|c| c.is_ascii_alphabetic())
    {
        return false;
    }
    !BANNED.iter().any(|word| candidate.contains(word))
}

/// Rewrite phonetic-alphabet words into their letters and digits.
///
/// Consecutive phonetic tokens (and bare single letters or digits)
/// accumulate into one run; any other token flushes the run and passes
/// through unchanged. Multi-digit numerals stay opaque: "44" is a word,
/// not two fours.
fn rewrite_phonetics(text: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut run = String::new();

    let tokens = text
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '.' | '-' | '/' | '\\'))
        .filter(|t| !t.is_empty());

    for token in tokens {
        let mut chars = token.chars();
        let lone = match (chars.next(), chars.next()) {
            (Some(c), None) if c.is_ascii_alphanumeric() => Some(c.to_ascii_uppercase()),
            _ => None,
        };

        if let Some(ch) = phonetic_char(token).or(lone) {
            run.push(ch);
        } else {
            if !run.is_empty() {
                words.push(std::mem::take(&mut run));
            }
            words.push(token.to_string());
        }
    }
    if !run.is_empty() {
        words.push(run);
    }

    words.join(" ")
}

/// Look up a token in the ITU phonetic table, including the variants and
/// procedural digit words heard on the air.
fn phonetic_char(token: &str) -> Option<char> {
    let token = token.to_ascii_lowercase();
    let ch = match token.as_str() {
        "alpha" | "alfa" => 'A',
        "bravo" => 'B',
        "charlie" => 'C',
        "delta" => 'D',
        "echo" => 'E',
        "foxtrot" | "fox" => 'F',
        "golf" => 'G',
        "hotel" => 'H',
        "india" => 'I',
        "juliett" | "juliet" => 'J',
        "kilo" => 'K',
        "lima" => 'L',
        "mike" => 'M',
        "november" => 'N',
        "oscar" => 'O',
        "papa" => 'P',
        "quebec" => 'Q',
        "romeo" => 'R',
        "sierra" => 'S',
        "tango" => 'T',
        "uniform" => 'U',
        "victor" => 'V',
        "whiskey" | "whisky" => 'W',
        "xray" => 'X',
        "yankee" => 'Y',
        "zulu" => 'Z',
        "zero" | "oh" => '0',
        "one" | "wun" => '1',
        "two" => '2',
        "three" | "tree" => '3',
        "four" | "fower" => '4',
        "five" | "fife" => '5',
        "six" => '6',
        "seven" => '7',
        "eight" | "ait" => '8',
        "nine" | "niner" => '9',
        _ => return None,
    };
    Some(ch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_match() {
        let found = extract("W1AW this is F4JZW");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].text, "W1AW");
        assert_eq!(found[1].text, "F4JZW");
        for c in &found {
            assert_eq!(c.method, ExtractionMethod::Direct);
            assert_eq!(c.confidence, 0.90);
        }
    }

    #[test]
    fn test_phonetic_match() {
        let found = extract("CQ CQ CQ this is Fox Four Juliet Zulu Whiskey portable");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text, "F4JZW");
        assert_eq!(found[0].method, ExtractionMethod::Phonetic);
        assert_eq!(found[0].confidence, 0.70);
    }

    #[test]
    fn test_procedural_digit_words() {
        let found = extract("kilo delta niner charlie whiskey x-ray");
        // x-ray splits on '-' into "x" and "ray"; the bare x still lands.
        assert_eq!(found[0].text, "KD9CWX");
    }

    #[test]
    fn test_banned_and_digitless_rejected() {
        assert!(extract("HELLO WORLD").is_empty());
        assert!(!is_valid("ABCD"));
        assert!(!is_valid("W1AW2"));
        assert!(is_valid("W1AW"));
    }

    #[test]
    fn test_length_bounds() {
        assert!(!is_valid("A1B"));
        assert!(is_valid("A1BC"));
        assert!(is_valid("AB12CDEF".get(..7).unwrap()));
        assert!(!is_valid("AB12CDEF"));
    }

    #[test]
    fn test_ends_must_be_letters() {
        assert!(!is_valid("1ABC"));
        assert!(!is_valid("AB12"));
    }

    #[test]
    fn test_direct_wins_over_phonetic_duplicate() {
        // Spelled out and then repeated verbatim: one result, direct.
        let found = extract("W1AW whiskey one alpha whiskey");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].method, ExtractionMethod::Direct);
    }

    #[test]
    fn test_no_duplicates_within_a_pass() {
        let found = extract("F4JZW F4JZW F4JZW");
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn test_bare_letters_and_digits_accumulate() {
        let found = extract("k 1 a b c calling");
        assert_eq!(found[0].text, "K1ABC");
    }

    #[test]
    fn test_multi_digit_numeral_stays_opaque() {
        assert_eq!(rewrite_phonetics("kilo 44 alpha"), "K 44 A");
        // The run break means no callsign forms around "44".
        assert!(extract("kilo 44 alpha").is_empty());
    }

    #[test]
    fn test_rewrite_preserves_other_words() {
        assert_eq!(
            rewrite_phonetics("this is whiskey one alpha whiskey mobile"),
            "this is W1AW mobile"
        );
    }
}

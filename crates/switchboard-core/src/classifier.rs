//! Request classification from raw input text
//!
//! Pure and total: classification is a function of the input text alone,
//! never fails, and absence of matches simply yields zero scores. Scoring
//! is case-insensitive substring containment — deliberately not tokenized,
//! so overlapping keywords may double count. Routing thresholds are tuned
//! against that behavior; tightening it would change outcomes for
//! borderline inputs.

/// Shared topic keyword table, consumed by both routing strategies.
pub const WEATHER_KEYWORDS: &[&str] = &[
    "weather",
    "temperature",
    "forecast",
    "rain",
    "snow",
    "sunny",
    "cloudy",
    "humidity",
    "windy",
    "climate",
];

pub const ETHICS_KEYWORDS: &[&str] = &[
    "ai ethics",
    "ethical ai",
    "bias",
    "fairness",
    "human dependence",
    "algorithmic",
    "accountability",
    "governance",
    "responsible ai",
];

pub const SUPPORT_KEYWORDS: &[&str] = &[
    "support",
    "help",
    "problem",
    "issue",
    "error",
    "question",
    "account",
    "billing",
    "password",
    "login",
];

pub const CHITCHAT_KEYWORDS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "how are you",
    "joke",
    "thanks",
    "thank you",
];

pub const FACTS_KEYWORDS: &[&str] = &["what is", "who is", "capital of", "define"];

pub const COMPLEXITY_KEYWORDS: &[&str] = &[
    "compare",
    "analyze",
    "research",
    "investigate",
    "study",
    "examine",
    "evaluate",
    "assess",
    "report",
    "comprehensive",
    "detailed",
    "multiple",
    "various",
    "different",
    "both",
    "all",
    "several",
];

const QUESTION_WORDS: &[&str] = &["what", "how", "why", "when", "where", "who", "?"];

/// Derived routing signals, computed once per request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub is_email_format: bool,
    pub weather_score: usize,
    pub ethics_score: usize,
    pub support_score: usize,
    pub chitchat_score: usize,
    pub facts_score: usize,
    pub complexity_score: usize,
    pub has_question_words: bool,
    pub word_count: usize,
    pub is_greeting: bool,
}

/// Classify raw input text into routing signals
pub fn classify(text: &str) -> Classification {
    let lower = text.to_lowercase();

    let chitchat_score = keyword_score(&lower, CHITCHAT_KEYWORDS);
    let word_count = text.split_whitespace().count();

    Classification {
        is_email_format: is_email_format(&lower),
        weather_score: keyword_score(&lower, WEATHER_KEYWORDS),
        ethics_score: keyword_score(&lower, ETHICS_KEYWORDS),
        support_score: keyword_score(&lower, SUPPORT_KEYWORDS),
        chitchat_score,
        facts_score: keyword_score(&lower, FACTS_KEYWORDS),
        complexity_score: keyword_score(&lower, COMPLEXITY_KEYWORDS),
        has_question_words: QUESTION_WORDS.iter().any(|w| lower.contains(w)),
        word_count,
        is_greeting: chitchat_score > 0 && word_count <= 4,
    }
}

/// Number of keywords from the list present in the text
fn keyword_score(lower: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| lower.contains(*k)).count()
}

/// Email-format detection: a disjunction of structural markers
fn is_email_format(lower: &str) -> bool {
    colon_follows(lower, "subject")
        || colon_follows(lower, "to")
        || colon_follows(lower, "from")
        || word_then_name(lower, "dear")
        || word_then_name(lower, "hello")
        || word_then_name(lower, "hi")
        || has_email_address(lower)
        || word_sequence(lower, &["best", "regards"])
        || lower.contains("sincerely")
        || word_sequence(lower, &["thank", "you", "for", "contacting"])
        || word_sequence(lower, &["we", "received", "your", "email"])
}

/// `word` followed by optional whitespace and a colon (e.g. "Subject :")
fn colon_follows(lower: &str, word: &str) -> bool {
    let mut search = 0;
    while let Some(pos) = lower[search..].find(word) {
        let after = search + pos + word.len();
        if lower[after..].trim_start().starts_with(':') {
            return true;
        }
        search = after;
    }
    false
}

/// `word` followed by whitespace and the start of another word
/// (e.g. "Dear Bob")
fn word_then_name(lower: &str, word: &str) -> bool {
    let mut search = 0;
    while let Some(pos) = lower[search..].find(word) {
        let after = search + pos + word.len();
        let rest = &lower[after..];
        let trimmed = rest.trim_start();
        let had_space = trimmed.len() < rest.len();
        if had_space && trimmed.chars().next().is_some_and(|c| c.is_alphanumeric()) {
            return true;
        }
        search = after;
    }
    false
}

/// Words in sequence separated by whitespace runs (e.g. "best regards"
/// across a line break)
fn word_sequence(lower: &str, words: &[&str]) -> bool {
    let Some(first) = words.first() else {
        return false;
    };

    let mut search = 0;
    'outer: while let Some(pos) = lower[search..].find(first) {
        let match_end = search + pos + first.len();
        let mut cursor = match_end;
        for word in &words[1..] {
            let rest = &lower[cursor..];
            let trimmed = rest.trim_start();
            if trimmed.len() == rest.len() || !trimmed.starts_with(word) {
                search = match_end;
                continue 'outer;
            }
            cursor = lower.len() - trimmed.len() + word.len();
        }
        return true;
    }
    false
}

/// An email-address shape: `@` followed by a label, a dot, and more word chars
fn has_email_address(lower: &str) -> bool {
    for (at_pos, _) in lower.match_indices('@') {
        let rest = &lower[at_pos + 1..];
        let label_end = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '-'))
            .unwrap_or(rest.len());
        if label_end == 0 {
            continue;
        }
        let after_label = &rest[label_end..];
        if let Some(tld) = after_label.strip_prefix('.') {
            if tld
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric() || c == '_')
            {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email_format_subject_line() {
        let c = classify("Subject: Account Issues\nI cannot log in.");
        assert!(c.is_email_format);
    }

    #[test]
    fn test_email_format_subject_with_space_before_colon() {
        assert!(classify("subject : weather request").is_email_format);
    }

    #[test]
    fn test_email_format_dear_greeting() {
        assert!(classify("Dear Bob,\nplease advise").is_email_format);
    }

    #[test]
    fn test_email_format_address() {
        assert!(classify("reach me at jane.doe@example.com thanks").is_email_format);
    }

    #[test]
    fn test_email_format_closing_lines() {
        assert!(classify("see attached\n\nBest regards,\nJane").is_email_format);
        assert!(classify("Sincerely, a confused user").is_email_format);
        assert!(classify("thank you for contacting us about this").is_email_format);
        assert!(classify("We received your email yesterday").is_email_format);
    }

    #[test]
    fn test_email_format_full_message() {
        let c = classify("Subject: Weather Request\nDear Support,\nWhat's the weather in Paris?");
        assert!(c.is_email_format);
        assert!(c.weather_score >= 1);
    }

    #[test]
    fn test_plain_question_is_not_email() {
        let c = classify("What's the weather in Paris?");
        assert!(!c.is_email_format);
    }

    #[test]
    fn test_bare_at_sign_is_not_email() {
        assert!(!classify("meet @ noon").is_email_format);
    }

    #[test]
    fn test_weather_scores() {
        let c = classify("What's the weather in Paris?");
        assert!(c.weather_score >= 1);
        assert_eq!(c.ethics_score, 0);
        assert!(c.has_question_words);
    }

    #[test]
    fn test_multiple_weather_keywords() {
        let c = classify("will the weather forecast show rain tomorrow");
        assert!(c.weather_score >= 3);
    }

    #[test]
    fn test_ethics_scores() {
        let c = classify("tell me about ai ethics and algorithmic bias");
        assert!(c.ethics_score >= 3);
    }

    #[test]
    fn test_support_with_question() {
        let c = classify("how do I reset my password?");
        assert!(c.support_score >= 1);
        assert!(c.has_question_words);
    }

    #[test]
    fn test_substring_scoring_is_not_tokenized() {
        // "rain" matches inside "training" — preserved behavior
        let c = classify("my training session");
        assert_eq!(c.weather_score, 1);
    }

    #[test]
    fn test_complexity_score() {
        let c = classify("compare and analyze multiple approaches");
        assert!(c.complexity_score >= 3);
    }

    #[test]
    fn test_word_count() {
        assert_eq!(classify("one two three").word_count, 3);
        assert_eq!(classify("").word_count, 0);
    }

    #[test]
    fn test_greeting_detection() {
        assert!(classify("hello!").is_greeting);
        assert!(classify("hey, how are you").is_greeting);
        // Long messages are not greetings even when they open with one
        assert!(!classify("hello, I have a detailed question about my invoice from last month").is_greeting);
    }

    #[test]
    fn test_classification_is_idempotent() {
        let text = "Subject: Help\nDear Team,\nWhat's the forecast? Thanks, bob@example.com";
        assert_eq!(classify(text), classify(text));
    }

    #[test]
    fn test_empty_input_is_total() {
        let c = classify("");
        assert!(!c.is_email_format);
        assert_eq!(c.weather_score, 0);
        assert_eq!(c.word_count, 0);
        assert!(!c.has_question_words);
    }
}

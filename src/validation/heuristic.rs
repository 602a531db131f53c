//! Heuristic quality scoring: length adequacy, structural well-formedness,
//! and absence of refusal or hedging language. Cheap, always available, the
//! default fallback for the other methods.

const HEDGING_PHRASES: &[&str] = &[
    "i'm not sure",
    "i am not sure",
    "i don't know",
    "i'm uncertain",
    "it's unclear",
    "i cannot",
    "i can't determine",
    "i may be wrong",
    "this might not be",
    "as an ai",
    "i'm unable to",
];

const REFUSAL_PHRASES: &[&str] = &[
    "i can't help with",
    "i cannot help with",
    "i won't",
    "i refuse",
    "i'm sorry, but i can't",
];

/// Score a candidate against its query. Bounded [0,1] and monotonic in each
/// signal: longer adequate answers never score lower, each hedge only
/// subtracts, balanced structure only adds.
pub fn score(query_text: &str, content: &str) -> (f32, String) {
    let mut confidence: f32 = 0.5;
    let mut notes: Vec<String> = Vec::new();

    // Length adequacy, relative to what was asked.
    let query_words = query_text.split_whitespace().count();
    let words = content.split_whitespace().count();
    if words >= 3 {
        confidence += 0.1;
    }
    if words >= 20 {
        confidence += 0.1;
    }
    if query_words > 50 && words < 10 {
        confidence -= 0.2;
        notes.push("response too short for the query".to_string());
    }

    // Structural well-formedness.
    if balanced(content) {
        confidence += 0.15;
    } else {
        confidence -= 0.2;
        notes.push("unbalanced brackets or code fences".to_string());
    }
    if ends_cleanly(content) {
        confidence += 0.15;
    } else {
        notes.push("appears truncated".to_string());
    }

    // Refusal and hedging markers.
    let lower = content.to_lowercase();
    let hedges = HEDGING_PHRASES.iter().filter(|p| lower.contains(*p)).count();
    if hedges > 0 {
        confidence -= 0.15 * hedges as f32;
        notes.push(format!("{} hedging phrase(s)", hedges));
    }
    if REFUSAL_PHRASES.iter().any(|p| lower.contains(*p)) {
        confidence -= 0.3;
        notes.push("refusal marker".to_string());
    }

    let confidence = confidence.clamp(0.0, 1.0);
    let reason = if notes.is_empty() {
        format!("heuristic confidence {:.2}", confidence)
    } else {
        format!("heuristic confidence {:.2}: {}", confidence, notes.join(", "))
    };
    (confidence, reason)
}

fn balanced(content: &str) -> bool {
    let mut round = 0i32;
    let mut square = 0i32;
    let mut curly = 0i32;
    for c in content.chars() {
        match c {
            '(' => round += 1,
            ')' => round -= 1,
            '[' => square += 1,
            ']' => square -= 1,
            '{' => curly += 1,
            '}' => curly -= 1,
            _ => {}
        }
        if round < 0 || square < 0 || curly < 0 {
            return false;
        }
    }
    round == 0 && square == 0 && curly == 0 && content.matches("```").count() % 2 == 0
}

fn ends_cleanly(content: &str) -> bool {
    let trimmed = content.trim_end();
    trimmed.ends_with(['.', '!', '?', ':'])
        || trimmed.ends_with("```")
        || trimmed.ends_with(['"', '\''])
        || trimmed.ends_with(['）', '。', '！', '？'])
}

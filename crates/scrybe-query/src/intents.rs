//! Deterministic intent classification (§4.8 step 1, SPEC_FULL "Query
//! intent templates"). Closed category set, rule-based: a keyword
//! matcher over the tokenized query text, checked in a fixed priority
//! order so the same query text always classifies the same way.

use scrybe_types::RecordType;

/// Closed set of query intent categories (SPEC_FULL "enumerates the
/// closed category set").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentCategory {
    Temporal,
    Focus,
    Counting,
    CrossWindow,
    AppActivity,
    TextLookup,
}

impl IntentCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            IntentCategory::Temporal => "temporal",
            IntentCategory::Focus => "focus",
            IntentCategory::Counting => "counting",
            IntentCategory::CrossWindow => "cross_window",
            IntentCategory::AppActivity => "app_activity",
            IntentCategory::TextLookup => "text_lookup",
        }
    }

    /// Normalized record kinds this intent may draw evidence from (§4.8
    /// step 2 "Route each category to required normalized record kinds
    /// (no raw media, no extraction)").
    pub fn required_record_types(self) -> &'static [RecordType] {
        match self {
            IntentCategory::Temporal => &[RecordType::EvidenceCaptureFrame],
            IntentCategory::Focus => &[RecordType::ObsUiaFocus],
            IntentCategory::Counting => &[RecordType::EvidenceCaptureFrame],
            IntentCategory::CrossWindow => &[RecordType::ObsUiaContext, RecordType::ObsUiaFocus],
            IntentCategory::AppActivity => &[RecordType::ObsUiaContext],
            IntentCategory::TextLookup => &[RecordType::DerivedTextOcr, RecordType::DerivedTextVlm],
        }
    }
}

/// Why classification could not settle on exactly one category (§4.8
/// step 4 "Ambiguity without enough constraints returns
/// NEEDS_CLARIFICATION").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClarificationReason {
    NoRecognizedIntentKeywords,
    MultipleIntentsMatched,
}

impl ClarificationReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ClarificationReason::NoRecognizedIntentKeywords => "no_recognized_intent_keywords",
            ClarificationReason::MultipleIntentsMatched => "multiple_intents_matched",
        }
    }
}

/// One classification rule: category plus the keywords that trigger it,
/// checked in declaration order.
struct Rule {
    category: IntentCategory,
    keywords: &'static [&'static str],
}

const RULES: &[Rule] = &[
    Rule { category: IntentCategory::Counting, keywords: &["how many", "count", "number of times"] },
    Rule { category: IntentCategory::Temporal, keywords: &["when", "what time", "how long ago", "yesterday", "today"] },
    Rule { category: IntentCategory::CrossWindow, keywords: &["switch", "between", "compare", "before and after"] },
    Rule { category: IntentCategory::Focus, keywords: &["focused", "looking at", "active window", "what was i doing"] },
    Rule { category: IntentCategory::AppActivity, keywords: &["which app", "what application", "using which program"] },
    Rule { category: IntentCategory::TextLookup, keywords: &["what did it say", "find the text", "contains", "said"] },
];

/// Classify `query_text` into exactly one [`IntentCategory`], or report
/// why the classifier couldn't settle on one (§4.8 step 1).
pub fn classify(query_text: &str) -> Result<IntentCategory, ClarificationReason> {
    let lowered = query_text.to_lowercase();
    let mut matched: Vec<IntentCategory> = RULES
        .iter()
        .filter(|rule| rule.keywords.iter().any(|kw| lowered.contains(kw)))
        .map(|rule| rule.category)
        .collect();
    matched.dedup_by_key(|c| c.as_str());

    match matched.len() {
        0 => Err(ClarificationReason::NoRecognizedIntentKeywords),
        1 => Ok(matched[0]),
        _ => Err(ClarificationReason::MultipleIntentsMatched),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counting_keyword_classifies_as_counting() {
        assert_eq!(classify("how many times did I open slack"), Ok(IntentCategory::Counting));
    }

    #[test]
    fn temporal_keyword_classifies_as_temporal() {
        assert_eq!(classify("when did I last open the terminal"), Ok(IntentCategory::Temporal));
    }

    #[test]
    fn unrecognized_query_needs_clarification() {
        assert_eq!(classify("purple elephant migration"), Err(ClarificationReason::NoRecognizedIntentKeywords));
    }

    #[test]
    fn ambiguous_query_matching_two_rules_needs_clarification() {
        // Matches both "counting" ("how many") and "temporal" ("today").
        assert_eq!(classify("how many windows did I use today"), Err(ClarificationReason::MultipleIntentsMatched));
    }

    #[test]
    fn classification_is_deterministic_across_repeated_calls() {
        let text = "what app was I using";
        assert_eq!(classify(text), classify(text));
    }
}

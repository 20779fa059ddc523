//! Excerpt payload fixtures.

use construe_core::Excerpt;
use serde_json::{json, Value};

/// Tokens for a sentence; `","` and `"."` become punctuation.
pub fn tokens(words: &[&str]) -> Value {
    let items: Vec<Value> = words
        .iter()
        .map(|w| {
            if *w == "," || *w == "." {
                json!({ "text": w, "lemma": w, "upos": "PUNCT" })
            } else {
                json!({ "text": w, "lemma": w.to_lowercase(), "upos": "X" })
            }
        })
        .collect();
    Value::Array(items)
}

pub fn excerpt(sentences: Value) -> Excerpt {
    serde_json::from_value(json!({ "id": "fixture", "sentences": sentences }))
        .expect("Failed to parse excerpt fixture")
}

/// "His rebus gestis , Caesar ..." with one ablative absolute at [2,5]
/// followed by a comma.
pub fn ablative_absolute_excerpt() -> Excerpt {
    excerpt(json!([{
        "sid": "1.1",
        "tokens": tokens(&["Tum", "vero", "his", "rebus", "omnibus", "gestis", ",", "Caesar", "profectus", "est", "."]),
        "constructions": [
            { "type": "abl_abs", "start": 2, "end": 5 }
        ]
    }]))
}

/// A future more vivid conditional plus an unrelated ablative absolute.
pub fn conditional_excerpt() -> Excerpt {
    excerpt(json!([{
        "sid": "2.4",
        "tokens": tokens(&["Si", "venies", ",", "urbe", "capta", ",", "gaudebimus", "omnes", "."]),
        "constructions": [
            {
                "type": "conditional_protasis", "start": 0, "end": 1,
                "conditional": {
                    "label": "future_more_vivid",
                    "protasis": { "verb_index": 1 },
                    "apodosis": { "verb_index": 6 }
                }
            },
            { "type": "abl_abs", "start": 3, "end": 4 },
            {
                "type": "conditional_apodosis", "start": 6, "end": 7,
                "conditional": {
                    "label": "future_more_vivid",
                    "protasis": { "verb_index": 1 },
                    "apodosis": { "verb_index": 6 }
                }
            }
        ]
    }]))
}

/// Two protases sharing one apodosis, which lists both protasis verbs.
pub fn shared_apodosis_excerpt() -> Excerpt {
    let protasis = |verb: usize| {
        json!({
            "label": "future_more_vivid",
            "protasis": { "verb_index": verb },
            "apodosis": { "verb_index": 6 }
        })
    };
    excerpt(json!([{
        "sid": "6.3",
        "tokens": tokens(&["Si", "venies", ",", "si", "manebis", ",", "gaudebo", "."]),
        "constructions": [
            { "type": "conditional_protasis", "start": 0, "end": 1, "conditional": protasis(1) },
            { "type": "conditional_protasis", "start": 3, "end": 4, "conditional": protasis(4) },
            {
                "type": "conditional_apodosis", "start": 6, "end": 6,
                "conditional": { "label": "future_more_vivid", "protasis_verb_indexes": [1, 4] }
            }
        ]
    }]))
}

/// Two purpose clauses in separate sentences.
pub fn purpose_excerpt() -> Excerpt {
    excerpt(json!([
        {
            "sid": "3.1",
            "tokens": tokens(&["Venit", "ut", "videret", "."]),
            "constructions": [
                { "type": "purpose_clause", "subtype": "ut_ne", "start": 1, "end": 2 }
            ]
        },
        {
            "sid": "3.2",
            "tokens": tokens(&["Misit", "legatos", "ad", "pacem", "petendam", "."]),
            "constructions": [
                { "type": "purpose_clause", "subtype": "ad_noun_gerundive", "start": 2, "end": 4 }
            ]
        }
    ]))
}

/// Three constructions, none of which the learner will find.
pub fn three_target_excerpt() -> Excerpt {
    excerpt(json!([{
        "sid": "4.2",
        "tokens": tokens(&["Cum", "id", "nuntiatum", "esset", ",", "dixit", "se", "venturum", "esse", "ad", "pugnandum", "."]),
        "constructions": [
            { "type": "cum_clause", "start": 0, "end": 3 },
            { "type": "indirect_statement", "start": 6, "end": 8 },
            { "type": "gerund", "start": 9, "end": 10 }
        ]
    }]))
}

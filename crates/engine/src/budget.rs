//! Token estimation and per-category budget allocation.
//!
//! Uses a character-based heuristic: ~4 characters per token, rounded up.
//! Budgets are computed in tokens from the profile weights, then turned into
//! character budgets for the formatter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::profiles::{Category, WeightProfile};

pub const CHARS_PER_TOKEN: usize = 4;

/// Appended to truncated items.
pub const ELLIPSIS: char = '…';

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Per-category token budgets for one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAllocation {
    pub max_tokens: usize,
    pub tokens: BTreeMap<Category, usize>,
}

impl TokenAllocation {
    pub fn tokens_for(&self, category: Category) -> usize {
        self.tokens.get(&category).copied().unwrap_or(0)
    }

    /// Character budget for `category`.
    pub fn chars_for(&self, category: Category) -> usize {
        self.tokens_for(category) * CHARS_PER_TOKEN
    }

    pub fn total_tokens(&self) -> usize {
        self.tokens.values().sum()
    }
}

/// Absorbs f32 weight noise so a 0.2 share of 100 is 20, not 19.
const SHARE_EPSILON: f64 = 1e-6;

/// Split `max_tokens` across categories by weight.
///
/// `budget[c] = floor(weight[c] / sum(weights) * max_tokens)`. The total
/// never exceeds `max_tokens`.
pub fn allocate(profile: &WeightProfile, max_tokens: usize) -> TokenAllocation {
    let sum: f64 = profile.weights().map(|(_, w)| f64::from(w)).sum();

    let mut tokens: BTreeMap<Category, usize> = profile
        .weights()
        .map(|(category, weight)| {
            let share = if sum > 0.0 {
                f64::from(weight) / sum * max_tokens as f64
            } else {
                0.0
            };
            (category, (share + SHARE_EPSILON).floor() as usize)
        })
        .collect();

    // The epsilon can push a share across an integer boundary.
    while tokens.values().sum::<usize>() > max_tokens {
        let Some(largest) = tokens.values_mut().max() else {
            break;
        };
        *largest -= 1;
    }

    TokenAllocation { max_tokens, tokens }
}

/// Cut `text` to at most `cap` chars, ending in an ellipsis when cut.
pub fn truncate_chars(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        return text.to_string();
    }
    if cap == 0 {
        return String::new();
    }
    let mut out: String = text.chars().take(cap - 1).collect();
    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push(ELLIPSIS);
    out
}

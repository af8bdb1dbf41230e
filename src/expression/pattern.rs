use crate::core::{DbError, Result};
use lru::LruCache;
use regex::Regex;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

lazy_static::lazy_static! {
    static ref REGEX_LRU_CACHE: Arc<Mutex<LruCache<String, Arc<Regex>>>> =
        Arc::new(Mutex::new(LruCache::new(NonZeroUsize::new(200).unwrap())));
}

/// Escape LIKE wildcards in a literal comparison value.
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Convert a LIKE pattern to a regex
#[inline]
fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');

    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '%' => regex.push_str(".*"),
            '_' => regex.push('.'),
            '\\' if i + 1 < chars.len() => {
                i += 1;
                regex.push_str(&regex::escape(&chars[i].to_string()));
            }
            c if ".*+?^${}()|[]\\".contains(c) => {
                regex.push('\\');
                regex.push(c);
            }
            c => regex.push(c),
        }
        i += 1;
    }

    regex.push('$');
    regex
}

/// Fast path for simple patterns (no regex involved)
#[inline]
fn fast_path_like(text: &str, pattern: &str, case_sensitive: bool) -> Option<bool> {
    if pattern.contains('\\') {
        return None;
    }

    // 1. Exact match (no wildcards)
    if !pattern.contains('%') && !pattern.contains('_') {
        return Some(if case_sensitive {
            text == pattern
        } else {
            text.eq_ignore_ascii_case(pattern)
        });
    }

    // 2. "prefix%"
    if pattern.ends_with('%')
        && !pattern[..pattern.len() - 1].contains('%')
        && !pattern.contains('_')
    {
        let prefix = &pattern[..pattern.len() - 1];
        return Some(if case_sensitive {
            text.starts_with(prefix)
        } else {
            text.to_lowercase().starts_with(&prefix.to_lowercase())
        });
    }

    // 3. "%suffix"
    if pattern.starts_with('%') && !pattern[1..].contains('%') && !pattern.contains('_') {
        let suffix = &pattern[1..];
        return Some(if case_sensitive {
            text.ends_with(suffix)
        } else {
            text.to_lowercase().ends_with(&suffix.to_lowercase())
        });
    }

    // 4. "%substring%"
    if pattern.starts_with('%')
        && pattern.ends_with('%')
        && pattern.matches('%').count() == 2
        && !pattern.contains('_')
    {
        let substring = &pattern[1..pattern.len() - 1];
        return Some(if case_sensitive {
            text.contains(substring)
        } else {
            text.to_lowercase().contains(&substring.to_lowercase())
        });
    }

    None
}

/// Fetch a compiled regex through the LRU cache.
fn get_or_compile_regex(
    cache_key: String,
    regex_pattern: &str,
    case_sensitive: bool,
) -> Result<Arc<Regex>> {
    {
        let mut cache = REGEX_LRU_CACHE.lock().unwrap();
        if let Some(regex) = cache.get(&cache_key) {
            return Ok(Arc::clone(regex));
        }
    }

    let compiled = regex::RegexBuilder::new(regex_pattern)
        .case_insensitive(!case_sensitive)
        .build()
        .map_err(|e| DbError::ExecutionError(format!("Invalid pattern: {}", e)))?;

    let compiled_arc = Arc::new(compiled);

    {
        let mut cache = REGEX_LRU_CACHE.lock().unwrap();
        cache.put(cache_key, Arc::clone(&compiled_arc));
    }

    Ok(compiled_arc)
}

/// Evaluate a SQL LIKE pattern against text.
#[inline]
pub fn eval_like(text: &str, pattern: &str, case_sensitive: bool) -> Result<bool> {
    // Try the fast path first (O(n), no regex)
    if let Some(result) = fast_path_like(text, pattern, case_sensitive) {
        return Ok(result);
    }

    let cache_key = if case_sensitive {
        format!("like:s:{}", pattern)
    } else {
        format!("like:i:{}", pattern)
    };
    let regex_pattern = like_to_regex(pattern);
    let regex = get_or_compile_regex(cache_key, &regex_pattern, case_sensitive)?;
    Ok(regex.is_match(text))
}

/// Evaluate a raw regex pattern against text, with the same compiled-regex
/// cache as [`eval_like`].
pub fn eval_regex(text: &str, pattern: &str, case_sensitive: bool) -> Result<bool> {
    let cache_key = if case_sensitive {
        format!("re:s:{}", pattern)
    } else {
        format!("re:i:{}", pattern)
    };
    let regex = get_or_compile_regex(cache_key, pattern, case_sensitive)?;
    Ok(regex.is_match(text))
}

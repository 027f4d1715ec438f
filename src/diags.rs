//! Warning sink and "did you mean" suggestions.

use std::collections::HashSet;
use std::sync::Mutex;

/// Deduplicating sink for request diagnostics.
///
/// Problems found while resolving a request (unknown keywords, values with
/// no index entries) are reported here instead of failing the request.
/// `warn` suppresses exact repeats of a message, `seen` reports whether a
/// message was already issued without recording it.
pub trait DiagnosticSink: Send + Sync {
    fn warn(&self, message: &str);
    fn seen(&self, message: &str) -> bool;
}

/// Default sink, forwarding first occurrences to [`log::warn!`].
#[derive(Debug, Default)]
pub struct LogSink {
    issued: Mutex<HashSet<String>>,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DiagnosticSink for LogSink {
    fn warn(&self, message: &str) {
        let mut issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        if issued.insert(message.to_string()) {
            log::warn!("{message}");
        }
    }

    fn seen(&self, message: &str) -> bool {
        let issued = self.issued.lock().unwrap_or_else(|e| e.into_inner());
        issued.contains(message)
    }
}

/// Case-insensitive edit distance.
pub(crate) fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[b.len()]
}

/// Closest vocabulary entry, if close enough to be a plausible typo.
///
/// The distance must be strictly smaller than the length of both words, so
/// a short word never "suggests" an unrelated short candidate.
pub(crate) fn did_you_mean<'a, S: AsRef<str>>(word: &str, vocabulary: &'a [S]) -> Option<&'a str> {
    let (distance, best) = vocabulary
        .iter()
        .map(|w| (edit_distance(word, w.as_ref()), w.as_ref()))
        .min()?;
    if distance < word.chars().count().min(best.chars().count()) {
        Some(best)
    } else {
        None
    }
}

/// Emit `message` once, followed by a suggestion for each word that has a
/// near match in `vocabulary`.
pub(crate) fn warn_with_suggestions<W, S>(
    sink: &dyn DiagnosticSink,
    message: &str,
    words: &[W],
    vocabulary: &[S],
) where
    W: AsRef<str>,
    S: AsRef<str>,
{
    if sink.seen(message) {
        return;
    }
    sink.warn(message);
    for word in words {
        let word = word.as_ref();
        if let Some(best) = did_you_mean(word, vocabulary) {
            sink.warn(&format!("Did you mean {best:?} instead of {word:?}?"));
        }
    }
}

//! Prefix translation tables.
//!
//! A table is an ordered list of `{lhs, rhs}` pairs; `rhs = None` marks the
//! entry as a null translation (the matched name is undefined). Lookup
//! finds the longest `lhs` that is a *component-aligned* prefix of the
//! queried name — alignment is checked by appending the `..` sentinel to
//! both sides before comparing, so a table entry for `foo` never
//! spuriously matches a name like `foobar` that merely happens to start
//! with the same bytes. A matching non-null entry rewrites the matched
//! prefix to `rhs` and the remainder resumes lookup one scope up.

#[derive(Clone, Debug)]
pub struct TranslationEntry {
    pub lhs: Vec<u8>,
    pub rhs: Option<Vec<u8>>,
}

#[derive(Clone, Debug, Default)]
pub struct TranslationTable {
    entries: Vec<TranslationEntry>,
}

const SENTINEL: &[u8] = b"..";

fn with_sentinel(bytes: &[u8]) -> Vec<u8> {
    let mut v = bytes.to_vec();
    v.extend_from_slice(SENTINEL);
    v
}

impl TranslationTable {
    pub fn new() -> Self {
        TranslationTable { entries: Vec::new() }
    }

    pub fn push(&mut self, lhs: Vec<u8>, rhs: Option<Vec<u8>>) {
        self.entries.push(TranslationEntry { lhs, rhs });
    }

    pub fn with(mut self, lhs: Vec<u8>, rhs: Option<Vec<u8>>) -> Self {
        self.push(lhs, rhs);
        self
    }

    /// Resolve `name` one level, per the longest-prefix-match / null-rhs
    /// rule. `None` inside `Some` distinguishes "translated to nothing, i.e.
    /// undefined" from the outer `None`, which means "no entry matched at
    /// all, pass the name through unchanged."
    pub fn translate(&self, name: &[u8]) -> TranslateResult {
        let augmented_name = with_sentinel(name);
        let mut best: Option<&TranslationEntry> = None;
        for entry in &self.entries {
            let augmented_lhs = with_sentinel(&entry.lhs);
            if augmented_name.starts_with(&augmented_lhs) {
                if best.is_none_or(|b| entry.lhs.len() > b.lhs.len()) {
                    best = Some(entry);
                }
            }
        }
        match best {
            None => TranslateResult::Unmatched,
            Some(entry) => match &entry.rhs {
                None => TranslateResult::Undefined,
                Some(rhs) => {
                    let mut resolved = rhs.clone();
                    resolved.extend_from_slice(&name[entry.lhs.len()..]);
                    TranslateResult::Resolved(resolved)
                }
            },
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum TranslateResult {
    /// No table entry applies; the name passes through unchanged.
    Unmatched,
    /// A null-rhs entry matched: the name is undefined at this scope.
    Undefined,
    /// A non-null entry matched: lookup resumes with this name one scope up.
    Resolved(Vec<u8>),
}

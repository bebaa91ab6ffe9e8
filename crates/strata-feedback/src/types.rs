use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use strata_types::{TypeTag, Value};

use crate::STABILITY_THRESHOLD;

/// Observed-type multiset for one feedback key.
///
/// `counts` is the recorded data; `dominant`, `stability`, and `monomorphic` are maintained
/// eagerly so readers never see a stale summary.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TypeFeedbackRecord {
    pub counts: Vec<(TypeTag, u64)>,
    pub total: u64,
    pub dominant: Option<TypeTag>,
    pub stability: f64,
    pub monomorphic: bool,
}

impl TypeFeedbackRecord {
    pub fn observe(&mut self, tag: TypeTag) {
        match self.counts.iter_mut().find(|(t, _)| *t == tag) {
            Some((_, n)) => *n += 1,
            None => self.counts.push((tag, 1)),
        }
        self.total += 1;
        self.recompute();
    }

    /// Recompute the derived summary from `counts`. Ties break toward the first-observed tag.
    pub fn recompute(&mut self) {
        self.total = self.counts.iter().map(|(_, n)| n).sum();
        let best = self.counts.iter().max_by_key(|(_, n)| *n);
        match best {
            Some((tag, n)) if self.total > 0 => {
                self.dominant = Some(tag.clone());
                self.stability = *n as f64 / self.total as f64;
            }
            _ => {
                self.dominant = None;
                self.stability = 0.0;
            }
        }
        self.monomorphic = self.counts.len() == 1;
    }

    /// Whether a specialized path may assume [`Self::dominant`] at this site.
    pub fn specialization_allowed(&self) -> bool {
        self.dominant.is_some() && (self.monomorphic || self.stability > STABILITY_THRESHOLD)
    }
}

/// Key → observed-type record store. Records are created on first observation and live for the
/// session lifetime.
#[derive(Debug, Default)]
pub struct TypeFeedback {
    records: FxHashMap<String, TypeFeedbackRecord>,
}

impl TypeFeedback {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install an empty record for `key` if none exists yet.
    pub fn install(&mut self, key: &str) {
        self.records.entry(key.to_string()).or_default();
    }

    pub fn record(&mut self, key: &str, value: &Value) {
        self.record_tag(key, value.type_tag());
    }

    pub fn record_tag(&mut self, key: &str, tag: TypeTag) {
        self.records
            .entry(key.to_string())
            .or_default()
            .observe(tag);
    }

    pub fn get(&self, key: &str) -> Option<&TypeFeedbackRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Keys whose dominant tag a specialized path may assume, with the tag and stability.
    pub fn specialization_candidates(&self) -> Vec<(String, TypeTag, f64)> {
        let mut out: Vec<(String, TypeTag, f64)> = self
            .records
            .iter()
            .filter(|(_, rec)| rec.specialization_allowed())
            .map(|(key, rec)| {
                (
                    key.clone(),
                    rec.dominant.clone().expect("allowed implies dominant"),
                    rec.stability,
                )
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Recorded state as sorted `(key, record)` pairs, for the profile snapshot.
    pub fn snapshot(&self) -> Vec<(String, TypeFeedbackRecord)> {
        let mut out: Vec<(String, TypeFeedbackRecord)> = self
            .records
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    /// Replace the store contents from a snapshot. Summaries are recomputed from the imported
    /// counts so a hand-edited snapshot cannot smuggle in an inconsistent dominant tag.
    pub fn restore(&mut self, entries: Vec<(String, TypeFeedbackRecord)>) {
        self.records.clear();
        for (key, mut rec) in entries {
            rec.recompute();
            self.records.insert(key, rec);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nine_ints_one_string_is_stable_but_not_monomorphic() {
        let mut feedback = TypeFeedback::new();
        for _ in 0..9 {
            feedback.record("f.x", &Value::Int(1));
        }
        feedback.record("f.x", &Value::Str("s".to_string()));

        let rec = feedback.get("f.x").unwrap();
        assert_eq!(rec.dominant, Some(TypeTag::Integer));
        assert!((rec.stability - 0.9).abs() < f64::EPSILON);
        assert!(!rec.monomorphic);
        // stability == 0.9 is not strictly above the threshold
        assert!(!rec.specialization_allowed());
    }

    #[test]
    fn monomorphic_site_allows_specialization() {
        let mut feedback = TypeFeedback::new();
        feedback.record("f.x", &Value::Int(1));
        let rec = feedback.get("f.x").unwrap();
        assert!(rec.monomorphic);
        assert!(rec.specialization_allowed());
    }
}

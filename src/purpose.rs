//! Purpose tags naming the evaluation context a mean or covariance
//! function is bound to.

use std::fmt;

/// An evaluation context under which a mean or covariance function is
/// bound to a dataset.
///
/// Each tag selects an independent slot: binding data under one purpose
/// never affects what is bound under another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Purpose {
    /// Joint draws from the prior.
    Sample,
    /// Hyperparameter learning over the training samples.
    Learn,
    /// Evaluation over the prediction samples.
    Predict,
    /// Cross term between training and prediction samples.
    LearnPredict,
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Purpose::Sample => "sample",
            Purpose::Learn => "learn",
            Purpose::Predict => "predict",
            Purpose::LearnPredict => "learn_predict",
        };
        write!(f, "{name}")
    }
}

/// Per-purpose storage for bound data.
///
/// A slot holds whatever a model precomputes at binding time and is
/// invalidated only by the next `set`/`unset` for the same tag.
#[derive(Clone, Debug)]
pub(crate) struct PurposeMap<T> {
    sample: Option<T>,
    learn: Option<T>,
    predict: Option<T>,
    learn_predict: Option<T>,
}

impl<T> Default for PurposeMap<T> {
    fn default() -> Self {
        PurposeMap {
            sample: None,
            learn: None,
            predict: None,
            learn_predict: None,
        }
    }
}

impl<T> PurposeMap<T> {
    pub fn set(&mut self, purpose: Purpose, value: T) {
        *self.slot_mut(purpose) = Some(value);
    }

    pub fn unset(&mut self, purpose: Purpose) {
        *self.slot_mut(purpose) = None;
    }

    pub fn get(&self, purpose: Purpose) -> Option<&T> {
        match purpose {
            Purpose::Sample => self.sample.as_ref(),
            Purpose::Learn => self.learn.as_ref(),
            Purpose::Predict => self.predict.as_ref(),
            Purpose::LearnPredict => self.learn_predict.as_ref(),
        }
    }

    fn slot_mut(&mut self, purpose: Purpose) -> &mut Option<T> {
        match purpose {
            Purpose::Sample => &mut self.sample,
            Purpose::Learn => &mut self.learn,
            Purpose::Predict => &mut self.predict,
            Purpose::LearnPredict => &mut self.learn_predict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slots_are_independent() {
        let mut map = PurposeMap::default();
        map.set(Purpose::Learn, 320usize);
        map.set(Purpose::Predict, 80usize);

        assert_eq!(map.get(Purpose::Learn), Some(&320));
        assert_eq!(map.get(Purpose::Predict), Some(&80));
        assert_eq!(map.get(Purpose::Sample), None);

        map.unset(Purpose::Learn);
        assert_eq!(map.get(Purpose::Learn), None);
        assert_eq!(map.get(Purpose::Predict), Some(&80));
    }

    #[test]
    fn test_set_overwrites() {
        let mut map = PurposeMap::default();
        map.set(Purpose::LearnPredict, 1usize);
        map.set(Purpose::LearnPredict, 2usize);
        assert_eq!(map.get(Purpose::LearnPredict), Some(&2));
    }

    #[test]
    fn test_display() {
        assert_eq!(Purpose::LearnPredict.to_string(), "learn_predict");
        assert_eq!(Purpose::Sample.to_string(), "sample");
    }
}

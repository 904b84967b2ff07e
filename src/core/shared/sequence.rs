use super::value::SharedValue;

/// Thread-safe vector
pub type SharedSequence<T> = SharedValue<Vec<T>>;

impl<T> SharedValue<Vec<T>> {
    pub fn push(&self, value: T) {
        self.write_ticket().push(value);
    }

    /// Clone the element at `index`
    pub fn at(&self, index: usize) -> Option<T>
    where
        T: Clone,
    {
        self.read_ticket().get(index).cloned()
    }

    /// Remove the first element matching `pred`
    pub fn remove_first<P>(&self, pred: P) -> Option<T>
    where
        P: Fn(&T) -> bool,
    {
        let mut w = self.write_ticket();
        match w.iter().position(pred) {
            Some(index) => Some(w.remove(index)),
            None => {
                w.suppress_unlock_condition();
                None
            }
        }
    }

    pub fn len(&self) -> usize {
        self.read_ticket().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_ticket().is_empty()
    }

    /// Clone the whole sequence
    pub fn snapshot(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.read_ticket().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_access_and_removal() {
        let seq: SharedSequence<&str> = SharedSequence::default();
        seq.push("a");
        seq.push("b");
        seq.push("c");

        assert_eq!(seq.at(1), Some("b"));
        assert_eq!(seq.at(5), None);
        assert_eq!(seq.remove_first(|v| *v == "b"), Some("b"));
        assert_eq!(seq.remove_first(|v| *v == "z"), None);
        assert_eq!(seq.snapshot(), vec!["a", "c"]);
    }
}

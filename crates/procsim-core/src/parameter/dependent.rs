//! Time-dependent values.

/// Ordered mapping `time -> value` with unique, increasing times.
///
/// Reads between defined points are linearly interpolated, reads outside the defined range
/// are clamped to the nearest end point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependentValues {
    points: Vec<(f64, f64)>,
}

impl DependentValues {
    pub fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Build from arbitrary `(time, value)` pairs. Later duplicates of a time win.
    pub fn from_pairs(pairs: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut values = Self::new();
        for (time, value) in pairs {
            values.set_value(time, value);
        }
        values
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn search(&self, time: f64) -> Result<usize, usize> {
        self.points.binary_search_by(|(t, _)| t.total_cmp(&time))
    }

    /// Add a point or overwrite the value of an existing time point. NaN times are ignored.
    pub fn set_value(&mut self, time: f64, value: f64) {
        if time.is_nan() {
            return;
        }
        match self.search(time) {
            Ok(i) => self.points[i].1 = value,
            Err(i) => self.points.insert(i, (time, value)),
        }
    }

    /// Remove the point at `time` if it is defined.
    pub fn remove_value(&mut self, time: f64) {
        if let Ok(i) = self.search(time) {
            self.points.remove(i);
        }
    }

    /// Value at `time`. Returns `0.0` when no points are defined or `time` is NaN.
    pub fn value(&self, time: f64) -> f64 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) if !time.is_nan() => (*first, *last),
            _ => return 0.0,
        };
        if time <= first.0 {
            return first.1;
        }
        if time >= last.0 {
            return last.1;
        }
        match self.search(time) {
            Ok(i) => self.points[i].1,
            Err(i) => {
                let (t0, v0) = self.points[i - 1];
                let (t1, v1) = self.points[i];
                v0 + (v1 - v0) * (time - t0) / (t1 - t0)
            }
        }
    }

    pub fn times(&self) -> Vec<f64> {
        self.points.iter().map(|(t, _)| *t).collect()
    }

    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|(_, v)| *v).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.iter().copied()
    }

    pub fn clear(&mut self) {
        self.points.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation_and_clamping() {
        let values = DependentValues::from_pairs([(0.0, 1.0), (10.0, 5.0)]);
        assert_eq!(values.value(-5.0), 1.0);
        assert_eq!(values.value(5.0), 3.0);
        assert_eq!(values.value(15.0), 5.0);
        assert_eq!(values.value(10.0), 5.0);
    }

    #[test]
    fn test_empty_reads_zero() {
        let values = DependentValues::new();
        assert_eq!(values.value(3.0), 0.0);
        assert!(values.is_empty());
    }

    #[test]
    fn test_nan_time_reads_zero() {
        let values = DependentValues::from_pairs([(0.0, 1.0), (10.0, 5.0)]);
        assert_eq!(values.value(f64::NAN), 0.0);
        assert_eq!(values.value(-f64::NAN), 0.0);
        assert_eq!(values.value(f64::INFINITY), 5.0);
        assert_eq!(values.value(f64::NEG_INFINITY), 1.0);
    }

    #[test]
    fn test_nan_time_is_not_stored() {
        let mut values = DependentValues::from_pairs([(0.0, 1.0)]);
        values.set_value(f64::NAN, 3.0);
        assert_eq!(values.len(), 1);
        assert_eq!(values.value(100.0), 1.0);
    }

    #[test]
    fn test_single_point_is_constant() {
        let values = DependentValues::from_pairs([(2.0, 7.5)]);
        assert_eq!(values.value(-1.0), 7.5);
        assert_eq!(values.value(100.0), 7.5);
    }

    #[test]
    fn test_points_stay_sorted_and_unique() {
        let mut values = DependentValues::new();
        values.set_value(5.0, 1.0);
        values.set_value(1.0, 2.0);
        values.set_value(3.0, 3.0);
        values.set_value(1.0, 4.0);

        assert_eq!(values.times(), vec![1.0, 3.0, 5.0]);
        assert_eq!(values.values(), vec![4.0, 3.0, 1.0]);
    }

    #[test]
    fn test_remove_value() {
        let mut values = DependentValues::from_pairs([(0.0, 0.0), (1.0, 10.0), (2.0, 20.0)]);
        values.remove_value(1.0);
        values.remove_value(7.0);
        assert_eq!(values.times(), vec![0.0, 2.0]);
        assert_eq!(values.value(1.0), 10.0);
    }
}

//! The Parameter Projector: a bijection between a model's named,
//! heterogeneous free-parameter set (scalars and fixed-length vectors) and
//! the flat real array a gradient-based optimizer actually drives.

use std::collections::HashMap;

use codon_error::{EngineResult, engine_err};

/// A free parameter's current value, scalar or a fixed-length vector.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

/// One flat-array slot: either a whole scalar parameter, or one component
/// of a vector parameter (identified by its index within that vector).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamSlot {
    Scalar(String),
    Component(String, usize),
}

/// Maps a model's free parameters onto a flat array, one slot per scalar
/// or vector component, each carrying its own `(lower, upper)` bound.
pub struct ParamProjector {
    slots: Vec<ParamSlot>,
    bounds: Vec<(f64, f64)>,
    cached: Option<Vec<f64>>,
}

impl ParamProjector {
    /// Builds the projection from a model's free parameters, in the order
    /// given, looking up each named parameter's bound in `limits`.
    pub fn new(
        freeparams: &[(String, ParamValue)],
        limits: &HashMap<String, (f64, f64)>,
    ) -> EngineResult<Self> {
        let mut slots = Vec::new();
        let mut bounds = Vec::new();
        for (name, value) in freeparams {
            let &(lo, hi) = limits
                .get(name)
                .ok_or_else(|| engine_err!(Structural: "no bounds declared for parameter '{}'", name))?;
            if lo > hi {
                return Err(engine_err!(
                    Structural: "parameter '{}' has inverted bounds [{}, {}]",
                    name,
                    lo,
                    hi
                ));
            }
            match value {
                ParamValue::Scalar(_) => {
                    slots.push(ParamSlot::Scalar(name.clone()));
                    bounds.push((lo, hi));
                }
                ParamValue::Vector(v) => {
                    if v.is_empty() {
                        return Err(engine_err!(
                            Structural: "vector parameter '{}' has zero components",
                            name
                        ));
                    }
                    for i in 0..v.len() {
                        slots.push(ParamSlot::Component(name.clone(), i));
                        bounds.push((lo, hi));
                    }
                }
            }
        }
        Ok(Self {
            slots,
            bounds,
            cached: None,
        })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// The last flat array [`ParamProjector::snapshot_changed`] cached, if any.
    pub fn cached(&self) -> Option<&[f64]> {
        self.cached.as_deref()
    }

    pub fn bounds(&self) -> &[(f64, f64)] {
        &self.bounds
    }

    pub fn slots(&self) -> &[ParamSlot] {
        &self.slots
    }

    /// Flattens a model's current named parameter values into the array
    /// shape this projector was built from.
    pub fn extract(&self, freeparams: &[(String, ParamValue)]) -> EngineResult<Vec<f64>> {
        let by_name: HashMap<&str, &ParamValue> =
            freeparams.iter().map(|(n, v)| (n.as_str(), v)).collect();
        let mut flat = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let value = match slot {
                ParamSlot::Scalar(name) => match by_name.get(name.as_str()) {
                    Some(ParamValue::Scalar(x)) => *x,
                    _ => {
                        return Err(engine_err!(
                            InvalidParameter: "parameter '{}' missing or not scalar",
                            name
                        ));
                    }
                },
                ParamSlot::Component(name, idx) => match by_name.get(name.as_str()) {
                    Some(ParamValue::Vector(v)) if *idx < v.len() => v[*idx],
                    _ => {
                        return Err(engine_err!(
                            InvalidParameter: "parameter '{}' missing component {}",
                            name,
                            idx
                        ));
                    }
                },
            };
            flat.push(value);
        }
        Ok(flat)
    }

    /// Inverts a flat array back into named parameter values, regrouping
    /// vector components. Every component of every vector parameter must be
    /// present exactly once.
    pub fn inject(&self, flat: &[f64]) -> EngineResult<Vec<(String, ParamValue)>> {
        if flat.len() != self.slots.len() {
            return Err(engine_err!(
                InvalidParameter: "flat array has {} elements, expected {}",
                flat.len(),
                self.slots.len()
            ));
        }

        let mut order: Vec<String> = Vec::new();
        let mut scalars: HashMap<String, f64> = HashMap::new();
        let mut vectors: HashMap<String, Vec<Option<f64>>> = HashMap::new();

        for (slot, &value) in self.slots.iter().zip(flat) {
            match slot {
                ParamSlot::Scalar(name) => {
                    if !order.contains(name) {
                        order.push(name.clone());
                    }
                    scalars.insert(name.clone(), value);
                }
                ParamSlot::Component(name, idx) => {
                    if !order.contains(name) {
                        order.push(name.clone());
                    }
                    let slots_for_name = self
                        .slots
                        .iter()
                        .filter(|s| matches!(s, ParamSlot::Component(n, _) if n == name))
                        .count();
                    let entry = vectors
                        .entry(name.clone())
                        .or_insert_with(|| vec![None; slots_for_name]);
                    entry[*idx] = Some(value);
                }
            }
        }

        let mut out = Vec::with_capacity(order.len());
        for name in order {
            if let Some(&x) = scalars.get(&name) {
                out.push((name, ParamValue::Scalar(x)));
            } else if let Some(comps) = vectors.remove(&name) {
                let mut v = Vec::with_capacity(comps.len());
                for (i, c) in comps.into_iter().enumerate() {
                    v.push(c.ok_or_else(|| {
                        engine_err!(
                            InvalidParameter: "vector parameter '{}' missing component {} during inversion",
                            name,
                            i
                        )
                    })?);
                }
                out.push((name, ParamValue::Vector(v)));
            }
        }
        Ok(out)
    }

    /// Clamps every slot of `flat` into its declared bound.
    pub fn clamp(&self, flat: &mut [f64]) {
        for (x, &(lo, hi)) in flat.iter_mut().zip(&self.bounds) {
            *x = x.clamp(lo, hi);
        }
    }

    /// Compares `flat` against the last snapshot this projector cached.
    /// Returns `true` (and refreshes the snapshot) only when it differs
    /// element-wise, so callers can skip recomputation on a no-op update.
    pub fn snapshot_changed(&mut self, flat: &[f64]) -> bool {
        let changed = match &self.cached {
            Some(prev) => prev.as_slice() != flat,
            None => true,
        };
        if changed {
            self.cached = Some(flat.to_vec());
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limits() -> HashMap<String, (f64, f64)> {
        let mut m = HashMap::new();
        m.insert("kappa".to_string(), (0.0, 20.0));
        m.insert("omega".to_string(), (1e-3, 100.0));
        m.insert("pi".to_string(), (0.0, 1.0));
        m
    }

    fn freeparams() -> Vec<(String, ParamValue)> {
        vec![
            ("kappa".to_string(), ParamValue::Scalar(3.0)),
            ("omega".to_string(), ParamValue::Scalar(0.5)),
            (
                "pi".to_string(),
                ParamValue::Vector(vec![0.1, 0.2, 0.3, 0.4]),
            ),
        ]
    }

    #[test]
    fn round_trips_extract_and_inject() {
        let proj = ParamProjector::new(&freeparams(), &limits()).unwrap();
        assert_eq!(proj.len(), 6);
        let flat = proj.extract(&freeparams()).unwrap();
        let back = proj.inject(&flat).unwrap();
        assert_eq!(back, freeparams());
    }

    #[test]
    fn rejects_wrong_length_injection() {
        let proj = ParamProjector::new(&freeparams(), &limits()).unwrap();
        assert!(proj.inject(&[0.0, 1.0]).is_err());
    }

    #[test]
    fn snapshot_short_circuits_identical_update() {
        let mut proj = ParamProjector::new(&freeparams(), &limits()).unwrap();
        let flat = proj.extract(&freeparams()).unwrap();
        assert!(proj.snapshot_changed(&flat));
        assert!(!proj.snapshot_changed(&flat));
        let mut other = flat.clone();
        other[0] += 1.0;
        assert!(proj.snapshot_changed(&other));
    }

    #[test]
    fn clamp_respects_bounds() {
        let proj = ParamProjector::new(&freeparams(), &limits()).unwrap();
        let mut flat = vec![999.0, -5.0, 2.0, 2.0, 2.0, 2.0];
        proj.clamp(&mut flat);
        assert_eq!(flat[0], 20.0);
        assert_eq!(flat[1], 1e-3);
        assert!(flat[2..].iter().all(|&x| x <= 1.0));
    }
}

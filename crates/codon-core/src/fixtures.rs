//! A minimal substitution model used only by this crate's own tests:
//! single scalar rate parameter, uniform stationary distribution, decaying
//! toward it at `exp(-rate * t)`. Exists purely to exercise the kernel and
//! coordinator against a model with a known closed-form derivative.

use std::collections::HashMap;

use codon_utils::Tensor;

use codon_error::EngineResult;

use crate::codon::N_CODONS;
use crate::params::{ParamSlot, ParamValue};

pub struct UniformRateModel {
    nsites: usize,
    rate: f64,
}

impl UniformRateModel {
    pub fn new(nsites: usize, rate: f64) -> Self {
        Self { nsites, rate }
    }
}

impl crate::model::SubstitutionModel for UniformRateModel {
    fn nsites(&self) -> usize {
        self.nsites
    }

    fn branch_scale(&self) -> f64 {
        1.0
    }

    fn freeparams(&self) -> Vec<(String, ParamValue)> {
        vec![("rate".to_string(), ParamValue::Scalar(self.rate))]
    }

    fn param_limits(&self) -> HashMap<String, (f64, f64)> {
        let mut m = HashMap::new();
        m.insert("rate".to_string(), (1e-6, 100.0));
        m
    }

    fn stationary_state(&self, _site: usize) -> Vec<f64> {
        vec![1.0 / N_CODONS as f64; N_CODONS]
    }

    fn dstationary_state(&self, _slot: &ParamSlot, _site: usize) -> Option<Vec<f64>> {
        None
    }

    fn m(&self, t: f64, _site: usize) -> Tensor<f64> {
        let p_diag = (-self.rate * t).exp();
        let background = (1.0 - p_diag) / N_CODONS as f64;
        Tensor::from_shape_fn((N_CODONS, N_CODONS), |flat| {
            let x = flat / N_CODONS;
            let y = flat % N_CODONS;
            if x == y { p_diag + background } else { background }
        })
    }

    fn dm(&self, slot: &ParamSlot, t: f64, _site: usize) -> Tensor<f64> {
        if !matches!(slot, ParamSlot::Scalar(name) if name == "rate") {
            return Tensor::from_shape_fn((N_CODONS, N_CODONS), |_| 0.0);
        }
        let dp_diag = -t * (-self.rate * t).exp();
        let dbackground = -dp_diag / N_CODONS as f64;
        Tensor::from_shape_fn((N_CODONS, N_CODONS), |flat| {
            let x = flat / N_CODONS;
            let y = flat % N_CODONS;
            if x == y {
                dp_diag + dbackground
            } else {
                dbackground
            }
        })
    }

    fn update_params(&mut self, freeparams: Vec<(String, ParamValue)>) -> EngineResult<()> {
        for (name, value) in freeparams {
            if name == "rate" {
                if let ParamValue::Scalar(x) = value {
                    self.rate = x;
                }
            }
        }
        Ok(())
    }
}

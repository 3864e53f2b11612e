//! Fixed, non-learnable affine transform: `y = scale * x + shift`.
//!
//! Typically used as input normalisation at the front of a network
//! (e.g. shift pixels by -128, then scale by 1/128).

use crate::nn::layer::Result;
use crate::nn::Layer;
use crate::tensor::Tensor;

#[derive(Debug, Clone, PartialEq)]
pub struct Affine {
    scale: f64,
    shift: Option<Tensor>,
}

impl Affine {
    pub fn new(scale: f64, shift: Option<Tensor>) -> Self {
        Self { scale, shift }
    }

    /// Pure scaling, `y = k * x`.
    pub fn scale(k: f64) -> Self {
        Self::new(k, None)
    }

    /// Pure translation, `y = x + shift`.
    pub fn translate(shift: Tensor) -> Self {
        Self::new(1.0, Some(shift))
    }
}

impl Layer for Affine {
    fn name(&self) -> &'static str {
        "affine"
    }

    fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        let scaled = input.scale(self.scale);
        match &self.shift {
            Some(shift) => Ok(scaled.add(shift)?),
            None => Ok(scaled),
        }
    }

    fn backward(&mut self, grad: &Tensor) -> Result<Tensor> {
        Ok(grad.scale(self.scale))
    }

    fn update(&mut self, _rate: f64) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nn::LayerError;

    #[test]
    fn test_translate() {
        let mut t = Affine::translate(Tensor::filled(2, 1, -0.5));
        let y = t.forward(&Tensor::column(&[1.0, 0.25])).unwrap();
        assert_eq!(y.to_vec(), vec![0.5, -0.25]);
        let g = t.backward(&Tensor::column(&[3.0, 4.0])).unwrap();
        assert_eq!(g.to_vec(), vec![3.0, 4.0]);
    }

    #[test]
    fn test_scale() {
        let mut s = Affine::scale(0.5);
        assert_eq!(s.forward(&Tensor::column(&[4.0])).unwrap().to_vec(), vec![2.0]);
        assert_eq!(s.backward(&Tensor::column(&[4.0])).unwrap().to_vec(), vec![2.0]);
    }

    #[test]
    fn test_shift_shape_mismatch() {
        let mut t = Affine::new(2.0, Some(Tensor::zeros(3, 1)));
        assert!(matches!(
            t.forward(&Tensor::column(&[1.0])),
            Err(LayerError::Tensor(_))
        ));
    }
}

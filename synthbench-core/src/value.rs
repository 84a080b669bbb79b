//! Deterministic Value Generation
//!
//! A generated program fills its containers without calling back into any RNG: each
//! container gets a closed-form expression over the loop indices, with eight
//! coefficients drawn here, at generation time, from the caller's seeded RNG.
//!
//! ```text
//! lin  = c0*i0 + c1*i1 + ... + ck*ik          (64-bit, k < 8)
//! ubyte  / byte   : lin % 256   (- 128)
//! uint16 / int16  : lin % 65535 (- 32768)
//! uint32 / int32  : lin                      (wraps on conversion)
//! float32         : lin * 1.23512e-4 * ((i0 % 3 + 1) * 2 - 3)
//! ```
//!
//! `ValueExpr::evaluate` is a reference interpreter for the emitted text, using the
//! target's conversion rules, so range guarantees can be checked without a compiler.

use crate::{ConfigurationError, ElementType, Reduction};
use rand::Rng;

/// Number of coefficients drawn per expression (and maximum supported rank)
pub const COEFFICIENT_COUNT: usize = 8;

/// Coefficients are drawn from `[0, COEFFICIENT_BOUND)`
const COEFFICIENT_BOUND: u64 = 100_000;

/// Fill expression for one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueExpr {
    element_type: ElementType,
    rank: usize,
    coefficients: [u64; COEFFICIENT_COUNT],
    positive: bool,
}

impl ValueExpr {
    /// Draw a fresh expression for a container of the given type and rank.
    ///
    /// All eight coefficients are always drawn, whatever the rank, so the RNG
    /// advances identically for every shape.
    pub fn draw<R: Rng + ?Sized>(
        rng: &mut R,
        element_type: ElementType,
        rank: usize,
        positive: bool,
    ) -> Result<Self, ConfigurationError> {
        let mut coefficients = [0u64; COEFFICIENT_COUNT];
        for c in coefficients.iter_mut() {
            *c = rng.gen_range(0..COEFFICIENT_BOUND);
        }
        Self::from_coefficients(element_type, rank, coefficients, positive)
    }

    /// Build an expression from known coefficients
    pub fn from_coefficients(
        element_type: ElementType,
        rank: usize,
        coefficients: [u64; COEFFICIENT_COUNT],
        positive: bool,
    ) -> Result<Self, ConfigurationError> {
        if rank == 0 {
            return Err(ConfigurationError::EmptyShape);
        }
        if rank > COEFFICIENT_COUNT {
            return Err(ConfigurationError::TooManyDimensions {
                rank,
                max: COEFFICIENT_COUNT,
            });
        }
        Ok(Self {
            element_type,
            rank,
            coefficients,
            positive,
        })
    }

    /// Element type the expression converts to
    pub fn element_type(&self) -> ElementType {
        self.element_type
    }

    /// Coefficients actually used (one per index)
    pub fn coefficients(&self) -> &[u64] {
        &self.coefficients[..self.rank]
    }

    /// Emit the expression as C-family source text over the indices `i0..i<rank-1>`.
    pub fn render(&self) -> String {
        let info = self.element_type.info();
        let lin = {
            let terms: Vec<String> = self
                .coefficients()
                .iter()
                .enumerate()
                .map(|(k, c)| format!("{}LL * i{}", c, k))
                .collect();
            format!("({})", terms.join(" + "))
        };

        let reduced = match info.reduction {
            Reduction::Modulo { modulus, shift: 0 } => format!("({} % {})", lin, modulus),
            Reduction::Modulo { modulus, shift } => {
                format!("({} % {} - {})", lin, modulus, -shift)
            }
            Reduction::Wrap => lin,
            Reduction::Scaled { factor } => format!(
                "((float32){} * {:e}f * (float32)((i0 % 3 + 1) * 2 - 3))",
                lin, factor
            ),
        };

        let value = match (self.positive, info.reduction) {
            (false, _) => reduced,
            (true, Reduction::Scaled { .. }) => format!("fabsf({})", reduced),
            (true, _) if info.signed => {
                format!("(llabs({}) % {})", reduced, info.max as i64 + 1)
            }
            (true, _) => format!("llabs({})", reduced),
        };

        format!("({})({})", info.name, value)
    }

    /// Value the emitted expression produces at `indices`, after conversion to
    /// the element type.
    pub fn evaluate(&self, indices: &[u64]) -> f64 {
        debug_assert_eq!(indices.len(), self.rank);
        let info = self.element_type.info();
        let lin = self
            .coefficients()
            .iter()
            .zip(indices)
            .fold(0i64, |acc, (&c, &i)| {
                acc.wrapping_add((c as i64).wrapping_mul(i as i64))
            });

        let reduced = match info.reduction {
            Reduction::Modulo { modulus, shift } => lin % modulus + shift,
            Reduction::Wrap => lin,
            Reduction::Scaled { factor } => {
                let sign = ((indices[0] as i64 % 3 + 1) * 2 - 3) as f32;
                let value = lin as f32 * factor * sign;
                let value = if self.positive { value.abs() } else { value };
                return value as f64;
            }
        };

        let reduced = match (self.positive, info.signed) {
            (false, _) => reduced,
            (true, true) => reduced.wrapping_abs() % (info.max as i64 + 1),
            (true, false) => reduced.wrapping_abs(),
        };
        convert(self.element_type, reduced)
    }
}

/// Integer conversion to the element type (modular, like the target's casts)
fn convert(element_type: ElementType, value: i64) -> f64 {
    match element_type {
        ElementType::UByte => value as u8 as f64,
        ElementType::Byte => value as i8 as f64,
        ElementType::UInt16 => value as u16 as f64,
        ElementType::Int16 => value as i16 as f64,
        ElementType::UInt32 => value as u32 as f64,
        ElementType::Int32 => value as i32 as f64,
        ElementType::Float32 => value as f32 as f64,
    }
}

/// Scalar argument substituted directly into a call expression.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    /// Integer literal within the element type's range
    Int(i64),
    /// Floating literal
    Float(f64),
}

impl Scalar {
    /// Render as a literal cast to `element_type`
    pub fn render(&self, element_type: ElementType) -> String {
        match self {
            Scalar::Int(v) => format!("({}){}", element_type.name(), v),
            Scalar::Float(v) => format!("({}){:e}", element_type.name(), v),
        }
    }
}

/// Draw a scalar uniformly over the type's range (`[-1e30, 1e30)` for float32).
pub fn draw_scalar<R: Rng + ?Sized>(rng: &mut R, element_type: ElementType) -> Scalar {
    match element_type {
        ElementType::Float32 => Scalar::Float(rng.gen_range(-1e30..1e30)),
        _ => {
            let info = element_type.info();
            Scalar::Int(rng.gen_range(info.min as i64..=info.max as i64))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// Every index tuple of `dims`, in the generated program's traversal order
    fn all_indices(dims: &[u64]) -> Vec<Vec<u64>> {
        let mut out = vec![Vec::new()];
        for &d in dims {
            out = out
                .into_iter()
                .flat_map(|prefix| {
                    (0..d).rev().map(move |i| {
                        let mut next = prefix.clone();
                        next.push(i);
                        next
                    })
                })
                .collect();
        }
        out
    }

    #[test]
    fn test_render_ubyte() {
        let expr = ValueExpr::from_coefficients(
            ElementType::UByte,
            2,
            [3, 5, 7, 11, 13, 17, 19, 23],
            false,
        )
        .unwrap();
        assert_eq!(expr.render(), "(ubyte)(((3LL * i0 + 5LL * i1) % 256))");
        assert_eq!(expr.evaluate(&[100, 1]), ((300 + 5) % 256) as f64);
    }

    #[test]
    fn test_render_signed_shift() {
        let expr =
            ValueExpr::from_coefficients(ElementType::Int16, 1, [7; COEFFICIENT_COUNT], false)
                .unwrap();
        assert_eq!(expr.render(), "(int16)(((7LL * i0) % 65535 - 32768))");
        assert_eq!(expr.evaluate(&[0]), -32768.0);
    }

    #[test]
    fn test_render_float_sign_pattern() {
        let expr =
            ValueExpr::from_coefficients(ElementType::Float32, 1, [1000; COEFFICIENT_COUNT], false)
                .unwrap();
        let text = expr.render();
        assert!(text.starts_with("(float32)("));
        assert!(text.contains("1.23512e-4f"));
        assert!(text.contains("(i0 % 3 + 1) * 2 - 3"));
        // i0 % 3 == 0 gives a negative factor, 1 a positive one
        assert!(expr.evaluate(&[3]) < 0.0);
        assert!(expr.evaluate(&[4]) > 0.0);
    }

    #[test]
    fn test_positive_wraps_in_abs() {
        let int_expr =
            ValueExpr::from_coefficients(ElementType::Byte, 1, [1; COEFFICIENT_COUNT], true)
                .unwrap();
        assert_eq!(
            int_expr.render(),
            "(byte)((llabs(((1LL * i0) % 256 - 128)) % 128))"
        );
        // |0 - 128| folds back into range instead of converting to -128
        assert_eq!(int_expr.evaluate(&[0]), 0.0);

        let float_expr =
            ValueExpr::from_coefficients(ElementType::Float32, 1, [1; COEFFICIENT_COUNT], true)
                .unwrap();
        assert!(float_expr.render().starts_with("(float32)(fabsf("));
    }

    #[test]
    fn test_rank_limits() {
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert_eq!(
            ValueExpr::draw(&mut rng, ElementType::UByte, 0, false),
            Err(ConfigurationError::EmptyShape)
        );
        assert_eq!(
            ValueExpr::draw(&mut rng, ElementType::UByte, 9, false),
            Err(ConfigurationError::TooManyDimensions { rank: 9, max: 8 })
        );
        assert!(ValueExpr::draw(&mut rng, ElementType::UByte, 8, false).is_ok());
    }

    #[test]
    fn test_draw_is_reproducible() {
        let mut a = ChaCha8Rng::seed_from_u64(7);
        let mut b = ChaCha8Rng::seed_from_u64(7);
        let ea = ValueExpr::draw(&mut a, ElementType::Int32, 3, false).unwrap();
        let eb = ValueExpr::draw(&mut b, ElementType::Int32, 3, false).unwrap();
        assert_eq!(ea, eb);
        assert_eq!(ea.render(), eb.render());
        assert!(ea.coefficients().iter().all(|&c| c < 100_000));
    }

    #[test]
    fn test_scalar_literals() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for ty in ElementType::ALL {
            for _ in 0..200 {
                match draw_scalar(&mut rng, ty) {
                    Scalar::Int(v) => {
                        assert!(ty.is_integer());
                        assert!((v as f64) >= ty.info().min && (v as f64) <= ty.info().max);
                    }
                    Scalar::Float(v) => {
                        assert_eq!(ty, ElementType::Float32);
                        assert!((-1e30..1e30).contains(&v));
                    }
                }
            }
        }
        assert_eq!(Scalar::Int(-5).render(ElementType::Int16), "(int16)-5");
        assert_eq!(
            Scalar::Float(1.5e29).render(ElementType::Float32),
            "(float32)1.5e29"
        );
    }

    fn element_type() -> impl Strategy<Value = ElementType> {
        prop::sample::select(ElementType::ALL.to_vec())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Every generated value is representable in its element type
        #[test]
        fn values_stay_in_range(
            ty in element_type(),
            dims in prop::collection::vec(1u64..=12, 1..=3),
            seed in any::<u64>(),
            positive in any::<bool>(),
        ) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let expr = ValueExpr::draw(&mut rng, ty, dims.len(), positive).unwrap();
            let info = ty.info();
            for idx in all_indices(&dims) {
                let v = expr.evaluate(&idx);
                prop_assert!(v.is_finite());
                prop_assert!(v >= info.min && v <= info.max, "{} out of range for {}", v, ty);
                if positive {
                    prop_assert!(v >= 0.0, "{} negative for positive {}", v, ty);
                }
            }
        }

        /// Large indices still reduce into range
        #[test]
        fn large_indices_stay_in_range(
            ty in element_type(),
            indices in prop::collection::vec(0u64..1_000_000, 1..=8),
            seed in any::<u64>(),
            positive in any::<bool>(),
        ) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let expr = ValueExpr::draw(&mut rng, ty, indices.len(), positive).unwrap();
            let v = expr.evaluate(&indices);
            prop_assert!(v >= ty.info().min && v <= ty.info().max);
            if positive {
                prop_assert!(v >= 0.0);
            }
        }
    }
}

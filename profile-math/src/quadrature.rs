//! Composite Gauss-Legendre quadrature.

/// Five-point Gauss-Legendre nodes on [-1, 1].
const NODES: [f64; 5] = [
    -0.906_179_845_938_664,
    -0.538_469_310_105_683_1,
    0.0,
    0.538_469_310_105_683_1,
    0.906_179_845_938_664,
];

const WEIGHTS: [f64; 5] = [
    0.236_926_885_056_189_1,
    0.478_628_670_499_366_5,
    0.568_888_888_888_888_9,
    0.478_628_670_499_366_5,
    0.236_926_885_056_189_1,
];

/// Integrate `f` over `[a, b]` with `panels` equal five-point panels.
///
/// Exact for polynomials up to degree 9 on each panel. `panels == 0` is
/// treated as one panel.
pub fn gauss_legendre<F>(f: F, a: f64, b: f64, panels: usize) -> f64
where
    F: Fn(f64) -> f64,
{
    let panels = panels.max(1);
    let width = (b - a) / panels as f64;
    let half = 0.5 * width;

    (0..panels)
        .map(|i| {
            let mid = a + (i as f64 + 0.5) * width;
            NODES
                .iter()
                .zip(WEIGHTS.iter())
                .map(|(&x, &w)| w * f(mid + half * x))
                .sum::<f64>()
                * half
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_weights_sum_to_interval_length() {
        assert_relative_eq!(WEIGHTS.iter().sum::<f64>(), 2.0, epsilon = 1e-15);
    }

    #[test]
    fn test_degree_nine_polynomial_is_exact() {
        let f = |x: f64| x.powi(9) - 3.0 * x.powi(4) + 2.0;
        // antiderivative x^10/10 - 3x^5/5 + 2x on [-1, 2]
        let exact = (1024.0 / 10.0 - 96.0 / 5.0 + 4.0) - (0.1 + 0.6 - 2.0);
        assert_relative_eq!(gauss_legendre(f, -1.0, 2.0, 1), exact, max_relative = 1e-13);
    }

    #[test]
    fn test_panels_converge_on_smooth_integrand() {
        let exact = 1.0 - (-10.0f64).exp();
        let coarse = gauss_legendre(|x| (-x).exp(), 0.0, 10.0, 1);
        let fine = gauss_legendre(|x| (-x).exp(), 0.0, 10.0, 20);
        assert!((fine - exact).abs() < (coarse - exact).abs());
        assert_relative_eq!(fine, exact, max_relative = 1e-12);
    }

    #[test]
    fn test_reversed_interval_changes_sign() {
        let forward = gauss_legendre(f64::cos, 0.0, 1.0, 3);
        let backward = gauss_legendre(f64::cos, 1.0, 0.0, 3);
        assert_relative_eq!(forward, -backward, epsilon = 1e-15);
        assert_relative_eq!(forward, 1f64.sin(), max_relative = 1e-13);
    }
}

//! Least-squares fits used by the edge locator and the through-focus analysis

use nalgebra::{DMatrix, DVector, Matrix4, Vector4};

/// Parameters of the logistic profile `a/(1+exp(-b(x-c)))+d`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Logistic {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}
impl Logistic {
    /// Initial guess for an edge profile: full swing, unit steepness, centered
    pub fn guess(profile: &[f64]) -> Self {
        let min = profile.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = profile.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Self {
            a: max - min,
            b: 1.,
            c: profile.len() as f64 * 0.5,
            d: min,
        }
    }
    fn from_vector(p: &Vector4<f64>) -> Self {
        Self {
            a: p[0],
            b: p[1],
            c: p[2],
            d: p[3],
        }
    }
    fn to_vector(self) -> Vector4<f64> {
        Vector4::new(self.a, self.b, self.c, self.d)
    }
    /// Numerically stable `1/(1+exp(-z))`
    fn sigmoid(z: f64) -> f64 {
        if z >= 0. {
            1. / (1. + (-z).exp())
        } else {
            let e = z.exp();
            e / (1. + e)
        }
    }
    pub fn eval(&self, x: f64) -> f64 {
        self.a * Self::sigmoid(self.b * (x - self.c)) + self.d
    }
    /// Value and gradient wrt. (a,b,c,d)
    fn eval_with_gradient(&self, x: f64) -> (f64, Vector4<f64>) {
        let s = Self::sigmoid(self.b * (x - self.c));
        let ds = s * (1. - s);
        (
            self.a * s + self.d,
            Vector4::new(s, self.a * ds * (x - self.c), -self.a * ds * self.b, 1.),
        )
    }
    fn cost(&self, profile: &[f64]) -> f64 {
        profile
            .iter()
            .enumerate()
            .map(|(i, y)| {
                let r = y - self.eval(i as f64);
                r * r
            })
            .sum()
    }
}

/// Levenberg-Marquardt settings
#[derive(Debug, Clone, Copy)]
pub struct LmOptions {
    pub max_iterations: usize,
    /// Relative cost reduction below which the fit has converged
    pub ftol: f64,
    /// Relative parameter step below which the fit has converged
    pub xtol: f64,
}
impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 500,
            ftol: 1e-10,
            xtol: 1e-10,
        }
    }
}

/// Fits a logistic curve to `profile` sampled at `x=0,1,2,...`
///
/// Returns `None` if the fit does not converge within the iteration budget
/// or produces non-finite parameters.
pub fn fit_logistic(profile: &[f64], init: Logistic, options: LmOptions) -> Option<Logistic> {
    if profile.len() < 4 {
        return None;
    }
    let scale: f64 = profile.iter().map(|y| y * y).sum::<f64>().max(1.);
    let mut p = init.to_vector();
    let mut cost = Logistic::from_vector(&p).cost(profile);
    let mut lambda = 1e-3;

    for _ in 0..options.max_iterations {
        if cost <= f64::EPSILON * f64::EPSILON * scale {
            return Some(Logistic::from_vector(&p));
        }
        let model = Logistic::from_vector(&p);
        let mut jtj = Matrix4::<f64>::zeros();
        let mut g = Vector4::<f64>::zeros();
        for (i, y) in profile.iter().enumerate() {
            let (f, grad) = model.eval_with_gradient(i as f64);
            jtj += grad * grad.transpose();
            g += grad * (y - f);
        }
        if !g.iter().all(|x| x.is_finite()) {
            return None;
        }

        loop {
            let mut damped = jtj;
            for k in 0..4 {
                damped[(k, k)] += lambda * jtj[(k, k)].max(1e-12);
            }
            let Some(step) = damped.cholesky().map(|c| c.solve(&g)) else {
                lambda *= 10.;
                if lambda > 1e16 {
                    return Some(model);
                }
                continue;
            };
            let candidate = p + step;
            let new_cost = Logistic::from_vector(&candidate).cost(profile);
            if new_cost.is_finite() && new_cost < cost {
                let reduction = (cost - new_cost) / cost;
                let small_step = step.norm() <= options.xtol * (candidate.norm() + options.xtol);
                p = candidate;
                cost = new_cost;
                lambda = (lambda * 0.1).max(1e-12);
                if reduction < options.ftol || small_step {
                    return Some(Logistic::from_vector(&p));
                }
                break;
            }
            lambda *= 10.;
            if lambda > 1e16 {
                // no descent direction left: local minimum
                return Some(model);
            }
        }
        if !p.iter().all(|x| x.is_finite()) {
            return None;
        }
    }
    None
}

/// Least-squares straight line `y = m*x + b`
///
/// Returns `None` with less than two distinct abscissae.
pub fn fit_line(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let x_mean = x[..n].iter().sum::<f64>() / nf;
    let y_mean = y[..n].iter().sum::<f64>() / nf;
    let (sxx, sxy) = x[..n]
        .iter()
        .zip(&y[..n])
        .fold((0f64, 0f64), |(sxx, sxy), (xi, yi)| {
            let dx = xi - x_mean;
            (sxx + dx * dx, sxy + dx * (yi - y_mean))
        });
    if sxx <= f64::EPSILON * nf {
        return None;
    }
    let m = sxy / sxx;
    Some((m, y_mean - m * x_mean))
}

/// Least-squares polynomial of degree `degree`, coefficients in increasing powers
///
/// Returns `None` with less than `degree+1` distinct abscissae.
pub fn polyfit(x: &[f64], y: &[f64], degree: usize) -> Option<Vec<f64>> {
    let n = x.len().min(y.len());
    if n <= degree {
        return None;
    }
    let vandermonde = DMatrix::from_fn(n, degree + 1, |i, j| x[i].powi(j as i32));
    let svd = vandermonde.svd(true, true);
    let eps = 1e-12 * svd.singular_values.max();
    if svd.rank(eps) <= degree {
        return None;
    }
    let coefs = svd.solve(&DVector::from_column_slice(&y[..n]), eps).ok()?;
    Some(coefs.iter().cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logistic_recovers_parameters() {
        let truth = Logistic {
            a: 40000.,
            b: 1.7,
            c: 11.3,
            d: 1200.,
        };
        let profile: Vec<f64> = (0..24).map(|x| truth.eval(x as f64)).collect();
        let fit = fit_logistic(&profile, Logistic::guess(&profile), LmOptions::default()).unwrap();
        assert!((fit.c - truth.c).abs() < 1e-4, "{fit:?}");
        assert!((fit.b - truth.b).abs() < 1e-4, "{fit:?}");
        assert!((fit.a - truth.a).abs() < 1e-2, "{fit:?}");
    }
    #[test]
    fn logistic_falling_edge() {
        let truth = Logistic {
            a: 20000.,
            b: -0.8,
            c: 9.6,
            d: 500.,
        };
        let profile: Vec<f64> = (0..20).map(|x| truth.eval(x as f64)).collect();
        let fit = fit_logistic(&profile, Logistic::guess(&profile), LmOptions::default()).unwrap();
        assert!((fit.c - truth.c).abs() < 1e-3, "{fit:?}");
    }
    #[test]
    fn logistic_sharp_step() {
        let profile: Vec<f64> = (0..16).map(|x| if x < 8 { 0. } else { 65535. }).collect();
        let fit = fit_logistic(&profile, Logistic::guess(&profile), LmOptions::default()).unwrap();
        assert!(fit.c > 7. && fit.c < 8., "{fit:?}");
    }
    #[test]
    fn sigmoid_is_stable() {
        assert_eq!(Logistic::sigmoid(-1000.), 0.);
        assert_eq!(Logistic::sigmoid(1000.), 1.);
        assert_eq!(Logistic::sigmoid(0.), 0.5);
    }
    #[test]
    fn line() {
        let x = [0., 1., 2., 3.];
        let y: Vec<f64> = x.iter().map(|x| 0.5 * x - 2.).collect();
        let (m, b) = fit_line(&x, &y).unwrap();
        assert!((m - 0.5).abs() < 1e-12 && (b + 2.).abs() < 1e-12);
        assert!(fit_line(&[1., 1.], &[0., 2.]).is_none());
        assert!(fit_line(&[1.], &[0.]).is_none());
    }
    #[test]
    fn parabola() {
        let x: Vec<f64> = (-4..=10).map(|i| i as f64 * 30.).collect();
        let y: Vec<f64> = x.iter().map(|x| 2e-5 * (x - 87.).powi(2) + 1.3).collect();
        let coefs = polyfit(&x, &y, 2).unwrap();
        assert!((coefs[2] - 2e-5).abs() < 1e-12, "{coefs:?}");
        assert!((-coefs[1] / (2. * coefs[2]) - 87.).abs() < 1e-6, "{coefs:?}");
        assert!(polyfit(&[1., 2.], &[0., 1.], 2).is_none());
        assert!(polyfit(&[1., 1., 2., 2.], &[0., 1., 0., 1.], 2).is_none());
    }
}

use ndarray::{Array2, ArrayView2};

/// 3x3 Laplacian response of a luminance plane, with reflect-101 borders
/// (`dcb|abcd|cba`).
pub fn laplacian(luma: ArrayView2<'_, f64>) -> Array2<f64> {
    let (h, w) = luma.dim();
    Array2::from_shape_fn((h, w), |(y, x)| {
        let up = luma[[reflect_101(y as isize - 1, h), x]];
        let down = luma[[reflect_101(y as isize + 1, h), x]];
        let left = luma[[y, reflect_101(x as isize - 1, w)]];
        let right = luma[[y, reflect_101(x as isize + 1, w)]];
        up + down + left + right - 4.0 * luma[[y, x]]
    })
}

/// Population variance of the Laplacian response. Higher is sharper.
///
/// An empty plane scores `0`.
pub fn laplacian_variance(luma: ArrayView2<'_, f64>) -> f64 {
    if luma.is_empty() {
        return 0.0;
    }
    laplacian(luma).var(0.0)
}

fn reflect_101(i: isize, len: usize) -> usize {
    let len = len as isize;
    if len == 1 {
        return 0;
    }
    let reflected = if i < 0 {
        -i
    } else if i >= len {
        2 * len - 2 - i
    } else {
        i
    };
    reflected as usize
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_flat_plane_has_zero_variance() {
        let luma = Array2::from_elem((16, 16), 87.0);
        assert_relative_eq!(laplacian_variance(luma.view()), 0.0);
    }

    #[test]
    fn test_interior_of_ramp_has_zero_response() {
        let luma = Array2::from_shape_fn((8, 8), |(_, x)| x as f64 * 10.0);
        let response = laplacian(luma.view());
        for y in 0..8 {
            for x in 1..7 {
                assert_relative_eq!(response[[y, x]], 0.0);
            }
        }
        // Reflection mirrors the ramp at the border, so the edge column responds.
        assert_relative_eq!(response[[0, 0]], 20.0);
    }

    #[test]
    fn test_single_spike_response() {
        let luma = array![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]];
        let response = laplacian(luma.view());
        assert_relative_eq!(response[[1, 1]], -4.0);
        // Edge neighbours see the spike twice through the reflected border.
        assert_relative_eq!(response[[0, 1]], 2.0);
        assert_relative_eq!(response[[0, 0]], 0.0);
    }

    #[test]
    fn test_spike_variance() {
        let luma = array![[0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 0.0]];
        // responses: centre -4, four edges 2 each, four corners 0
        let mean = (-4.0 + 8.0) / 9.0;
        let sq: f64 = [(-4.0f64), 2.0, 2.0, 2.0, 2.0, 0.0, 0.0, 0.0, 0.0]
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum();
        assert_relative_eq!(laplacian_variance(luma.view()), sq / 9.0, epsilon = 1e-12);
    }

    #[test]
    fn test_checkerboard_is_sharper_than_smooth() {
        let checker = Array2::from_shape_fn((32, 32), |(y, x)| if (x + y) % 2 == 0 { 255.0 } else { 0.0 });
        let smooth = Array2::from_shape_fn((32, 32), |(y, x)| ((x + y) as f64).sin() * 2.0 + 128.0);
        assert!(laplacian_variance(checker.view()) > laplacian_variance(smooth.view()));
    }

    #[test]
    fn test_empty_plane_scores_zero() {
        let luma = Array2::<f64>::zeros((0, 0));
        assert_relative_eq!(laplacian_variance(luma.view()), 0.0);
    }

    #[test]
    fn test_single_pixel_plane() {
        let luma = array![[42.0]];
        assert_relative_eq!(laplacian_variance(luma.view()), 0.0);
    }

    #[test]
    fn test_reflect_101() {
        assert_eq!(reflect_101(-1, 5), 1);
        assert_eq!(reflect_101(5, 5), 3);
        assert_eq!(reflect_101(2, 5), 2);
        assert_eq!(reflect_101(-1, 1), 0);
    }
}

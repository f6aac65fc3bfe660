/// Spectral transform engine
///
/// In-place radix-2 FFT/IFFT for power-of-two lengths. Non-recursive,
/// O(1) extra space, no precomputed twiddle table: each stage derives its
/// root by taking the principal square root of the previous one.

use num_complex::Complex64;
use thiserror::Error;
use tracing::trace;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FftError {
    #[error("Size of {context} must be {requirement}, is: {size}")]
    Size {
        context: &'static str,
        requirement: &'static str,
        size: usize,
    },
}

/// Check that `len` is a usable transform length (a power of two, never zero)
pub fn check_length(context: &'static str, len: usize) -> Result<(), FftError> {
    if !len.is_power_of_two() {
        return Err(FftError::Size {
            context,
            requirement: "power of 2",
            size: len,
        });
    }
    Ok(())
}

/// Forward transform, in place.
///
/// Fails without touching `buffer` when its length is not a power of two.
pub fn forward(buffer: &mut [Complex64]) -> Result<(), FftError> {
    check_length("FFT input", buffer.len())?;
    trace!("FFT on {} points", buffer.len());
    transform(buffer);
    Ok(())
}

/// Inverse transform, in place, scaled by 1/N.
///
/// Uses the time-reversal identity: reverse x[1..N], run the forward
/// transform, scale.
pub fn inverse(buffer: &mut [Complex64]) -> Result<(), FftError> {
    check_length("IFFT input", buffer.len())?;
    trace!("IFFT on {} points", buffer.len());

    let n = buffer.len();
    for i in 1..n / 2 {
        buffer.swap(i, n - i);
    }

    transform(buffer);

    let scale = 1.0 / n as f64;
    for value in buffer.iter_mut() {
        *value *= scale;
    }
    Ok(())
}

fn transform(x: &mut [Complex64]) {
    let n = x.len();

    // Closed forms for the smallest sizes
    match n {
        1 => return,
        2 => {
            let (a, b) = (x[0], x[1]);
            x[0] = a + b;
            x[1] = a - b;
            return;
        }
        4 => {
            let (a0, a1, a2, a3) = (x[0], x[1], x[2], x[3]);
            // -i * (x1 - x3)
            let f = Complex64::new(a1.im - a3.im, a3.re - a1.re);
            x[0] = a0 + a1 + a2 + a3;
            x[1] = a0 - a2 + f;
            x[2] = a0 - a1 + a2 - a3;
            x[3] = a0 - a2 - f;
            return;
        }
        _ => {}
    }

    permute(x);

    // First two radix-2 stages fused over 4-element blocks
    for i in (0..n).step_by(4) {
        let (a0, a1, a2, a3) = (x[i], x[i + 1], x[i + 2], x[i + 3]);
        let f = Complex64::new(a2.im - a3.im, a3.re - a2.re);
        x[i] = a0 + a1 + a2 + a3;
        x[i + 1] = a0 - a1 + f;
        x[i + 2] = a0 - a2 + a1 - a3;
        x[i + 3] = a0 - a1 - f;
    }

    // Remaining stages; the root starts at -90 degrees and is halved each stage
    let mut root = Complex64::new(0.0, -1.0);
    let mut half = 4;
    while half < n {
        root = root.sqrt();
        for offset in (0..n).step_by(half << 1) {
            let mut w = Complex64::new(1.0, 0.0);
            for k in 0..half {
                let i = offset + k;
                let f = w * x[i + half];
                let a = x[i];
                x[i] = a + f;
                x[i + half] = a - f;
                w *= root;
            }
        }
        half <<= 1;
    }
}

/// Bit-reversal permutation, in place.
fn permute(x: &mut [Complex64]) {
    let n = x.len();
    match n {
        1 | 2 => return,
        4 => {
            x.swap(1, 2);
            return;
        }
        8 => {
            x.swap(1, 4);
            x.swap(3, 6);
            return;
        }
        _ => {}
    }

    let shift = ((n - 1) as u64).leading_zeros();
    let half = n >> 1;
    for i in (0..n).step_by(2) {
        let mut ind = ((i as u64).reverse_bits() >> shift) as usize;
        // Even index in the upper half: its partner was swapped already
        if i < half && ind > i {
            x.swap(i, ind);
        }
        // Reverse of i + 1 is the reverse of i with the top bit set
        ind |= half;
        if ind > i + 1 {
            x.swap(i + 1, ind);
        }
    }
}

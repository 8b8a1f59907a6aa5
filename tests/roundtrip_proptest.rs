//! Property tests for the round-trip and dedup laws the engine is designed
//! to guarantee: arbitrary stride patterns reconstruct bit-exact data, the
//! same logical array under different strides checksums identically, and
//! identical content is deduplicated to a single on-disk copy.

use proptest::prelude::*;

use fieldser::{layout_from_strides, transcoder, AxisLayout, Layout4};

/// Builds a column-major contiguous layout for the given sizes plus an
/// explicit permutation of the four axes, returning a `Layout4` whose
/// strides describe the same logical array stored under that permutation's
/// physical order. `perm` is a permutation of `0..4` (indices into
/// `[i, j, k, l]`) giving the physical storage order, fastest axis first.
fn permuted_layout(sizes: [u32; 4], perm: [usize; 4], bpe: usize) -> Layout4 {
    let mut strides = [0isize; 4];
    let mut running = bpe as isize;
    for &axis in &perm {
        strides[axis] = if sizes[axis] == 1 { 0 } else { running };
        running *= sizes[axis] as isize;
    }
    layout_from_strides(
        sizes[0], sizes[1], sizes[2], sizes[3], strides[0], strides[1], strides[2], strides[3],
    )
}

fn permutations_of_4() -> Vec<[usize; 4]> {
    let mut perms = Vec::new();
    for a in 0..4 {
        for b in 0..4 {
            if b == a {
                continue;
            }
            for c in 0..4 {
                if c == a || c == b {
                    continue;
                }
                for d in 0..4 {
                    if d == a || d == b || d == c {
                        continue;
                    }
                    perms.push([a, b, c, d]);
                }
            }
        }
    }
    perms
}

fn element_count(sizes: &[u32; 4]) -> usize {
    sizes.iter().map(|&s| s as usize).product()
}

proptest! {
    /// For any rank-<=4 shape, any valid stride permutation, and any byte
    /// content, writing then reading through the transcoder reproduces the
    /// input exactly.
    #[test]
    fn round_trip_is_bytewise_identity(
        isize_ in 1u32..5,
        jsize in 1u32..5,
        ksize in 1u32..4,
        lsize in 1u32..3,
        perm_idx in 0usize..24,
        seed in any::<u64>(),
    ) {
        let sizes = [isize_, jsize, ksize, lsize];
        let perms = permutations_of_4();
        let perm = perms[perm_idx % perms.len()];
        let bpe = 8usize;
        let layout = permuted_layout(sizes, perm, bpe);

        let n = element_count(&sizes);
        let mut data = vec![0u8; n * bpe];
        let mut state = seed;
        for byte in data.iter_mut() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            *byte = (state >> 56) as u8;
        }

        let (linear, _sum) = transcoder::write_array(&data, bpe, &layout).unwrap();
        let mut back = vec![0u8; data.len()];
        transcoder::read_array(&linear, &mut back, bpe, &layout).unwrap();

        prop_assert_eq!(back, data);
    }

    /// Writing the same logical array under two different stride
    /// permutations produces identical linearized bytes and checksums.
    #[test]
    fn stride_permutation_invariance(
        isize_ in 1u32..5,
        jsize in 1u32..5,
        ksize in 1u32..4,
        perm_a_idx in 0usize..24,
        perm_b_idx in 0usize..24,
        seed in any::<u64>(),
    ) {
        let sizes = [isize_, jsize, ksize, 1];
        let perms = permutations_of_4();
        let perm_a = perms[perm_a_idx % perms.len()];
        let perm_b = perms[perm_b_idx % perms.len()];
        let bpe = 4usize;

        let n = element_count(&sizes);
        // One canonical logical array, addressed as column-major (i fastest).
        let mut logical = vec![0u32; n];
        let mut state = seed;
        for v in logical.iter_mut() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            *v = (state >> 32) as u32;
        }

        // Materialize the same logical array physically in each permutation's
        // storage order, then describe each with the strides that recover the
        // original (i,j,k,l) addressing.
        let store = |perm: [usize; 4]| -> (Vec<u8>, Layout4) {
            let mut phys = vec![0u32; n];
            let mut coeff = [0usize; 4];
            let mut running = 1usize;
            for &axis in &perm {
                coeff[axis] = running;
                running *= sizes[axis] as usize;
            }
            for i in 0..sizes[0] as usize {
                for j in 0..sizes[1] as usize {
                    for k in 0..sizes[2] as usize {
                        let logical_idx = ((k * sizes[1] as usize) + j) * sizes[0] as usize + i;
                        let phys_idx = i * coeff[0] + j * coeff[1] + k * coeff[2];
                        phys[phys_idx] = logical[logical_idx];
                    }
                }
            }
            let bytes: Vec<u8> = phys.iter().flat_map(|v| v.to_le_bytes()).collect();
            let layout = layout_from_strides(
                sizes[0], sizes[1], sizes[2], sizes[3],
                (coeff[0] * bpe) as isize,
                (coeff[1] * bpe) as isize,
                (coeff[2] * bpe) as isize,
                0,
            );
            (bytes, layout)
        };

        let (bytes_a, layout_a) = store(perm_a);
        let (bytes_b, layout_b) = store(perm_b);

        let (linear_a, sum_a) = transcoder::write_array(&bytes_a, bpe, &layout_a).unwrap();
        let (linear_b, sum_b) = transcoder::write_array(&bytes_b, bpe, &layout_b).unwrap();

        prop_assert_eq!(linear_a, linear_b);
        prop_assert_eq!(sum_a, sum_b);
    }

    /// When the caller's strides already match contiguous column-major
    /// order, the linearized buffer is a plain byte-for-byte copy.
    #[test]
    fn contiguous_column_major_is_identity(
        isize_ in 1u32..6,
        jsize in 1u32..6,
        seed in any::<u64>(),
    ) {
        let bpe = 8usize;
        let n = isize_ as usize * jsize as usize;
        let mut data = vec![0u8; n * bpe];
        let mut state = seed;
        for byte in data.iter_mut() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            *byte = (state >> 56) as u8;
        }
        let layout = Layout4::new(
            AxisLayout::new(isize_, bpe as isize),
            AxisLayout::new(jsize, (isize_ as usize * bpe) as isize),
            AxisLayout::new(1, 0),
            AxisLayout::new(1, 0),
        );
        let (out, _) = transcoder::write_array(&data, bpe, &layout).unwrap();
        prop_assert_eq!(out, data);
    }
}

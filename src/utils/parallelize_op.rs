/// `parallelize_op!` macro for repeating an operation across
/// chunks of a volume along its slow (Z) axis.
///
/// - `parallelize_op!((input, output), chunk_size, op)`
///
///     Splits the read-only `input` array and the mutable `output`
///     array into matching chunks of `chunk_size` slices along
///     `Axis(0)` and calls `op` on each pair in parallel. The
///     operation should have the signature
///     `op(start : usize, input_chunk : &ArrayView, output_chunk : &mut ArrayViewMut)
///     -> Result<R, QcError>`, where `start` is the Z index of the first
///     slice in the chunk. Evaluates to `Result<Vec<R>, QcError>` with
///     the per-chunk results in Z order. The first error stops the
///     remaining chunks from being scheduled.
///
///     <br>
///
/// - `parallelize_op!(serial, (input, output), chunk_size, op)`
///
///     Same chunking and same result, but run on the calling thread.
///
/// Requires `ndarray::Axis`, `rayon::prelude::*` and `QcError` in scope
/// at the call site.
///
/// _Warning! Behavior is not well-defined if the arrays do not have
/// the same length along `Axis(0)`!!_
macro_rules! parallelize_op {

    (   serial,
        ( $input : expr, $output : ident ),
        $chunk_size : expr,
        $op : expr
    ) => {{
        let chunk_size : usize = $chunk_size;
        $input.axis_chunks_iter(Axis(0), chunk_size)
        .zip($output.axis_chunks_iter_mut(Axis(0), chunk_size))
        .enumerate()
        .map(
            |(chunk_idx, (input_chunk, mut output_chunk))| -> Result<_, QcError> {
                $op(chunk_idx * chunk_size, &input_chunk, &mut output_chunk)
            }
        ).collect::<Result<Vec<_>, QcError>>()
    }};

    (   ( $input : expr, $output : ident ),
        $chunk_size : expr,
        $op : expr
    ) => {{
        let chunk_size : usize = $chunk_size;

        // Create matching lists of chunks to parallelize
        let input_chunks : Vec<_> = $input.axis_chunks_iter(Axis(0), chunk_size).collect();
        let output_chunks : Vec<_> = $output.axis_chunks_iter_mut(Axis(0), chunk_size).collect();

        input_chunks.into_par_iter()
        .zip(output_chunks.into_par_iter())
        .enumerate()
        .map(
            |(chunk_idx, (input_chunk, mut output_chunk))| -> Result<_, QcError> {
                $op(chunk_idx * chunk_size, &input_chunk, &mut output_chunk)
            }
        ).collect::<Result<Vec<_>, QcError>>()
    }};
}

pub (crate) use parallelize_op;

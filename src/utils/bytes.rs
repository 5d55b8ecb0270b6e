/// Return a byte slice view of a slice of sized values.
///
/// Safety: This performs a plain reinterpretation of the memory of `T` as bytes.
/// The caller must ensure the element type is POD-like (plain integer/floating
/// fields only). This helper avoids repeated unsafe blocks across the codebase.
pub fn slice_as_bytes<T: Sized>(v: &[T]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(v.as_ptr() as *const u8, std::mem::size_of_val(v)) }
}

/// Reassemble a byte buffer into a vector of POD-like values.
///
/// Safety: same contract as `slice_as_bytes`. The byte length must be an exact
/// multiple of `size_of::<T>()`.
pub fn bytes_to_vec<T: Sized + Copy>(bytes: &[u8]) -> Vec<T> {
    let elem = std::mem::size_of::<T>();
    assert_eq!(
        bytes.len() % elem,
        0,
        "byte length not a multiple of element size"
    );
    let count = bytes.len() / elem;
    let mut out = Vec::with_capacity(count);
    unsafe {
        std::ptr::copy_nonoverlapping(bytes.as_ptr() as *const T, out.as_mut_ptr(), count);
        out.set_len(count);
    }
    out
}

/// Declared shape of a device array: four ordered extents.
///
/// Unused trailing dimensions are 1 by convention; the all-zero value is the
/// reset state of a freshly initialised manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArrayDims([u64; 4]);

impl ArrayDims {
    pub fn new(d0: u64, d1: u64, d2: u64, d3: u64) -> Self {
        Self([d0, d1, d2, d3])
    }

    pub fn zeros() -> Self {
        Self([0; 4])
    }

    /// Total element count: the product of all four extents.
    pub fn elements(&self) -> u64 {
        self.0.iter().product()
    }

    pub fn get(&self, idx: usize) -> u64 {
        self.0[idx]
    }

    pub fn as_array(&self) -> [u64; 4] {
        self.0
    }
}

impl Default for ArrayDims {
    fn default() -> Self {
        Self::zeros()
    }
}

impl From<[u64; 4]> for ArrayDims {
    fn from(dims: [u64; 4]) -> Self {
        Self(dims)
    }
}

impl std::fmt::Display for ArrayDims {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}x{}x{}x{}",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elements_is_product_of_extents() {
        assert_eq!(ArrayDims::new(4, 4, 1, 1).elements(), 16);
        assert_eq!(ArrayDims::new(2, 3, 4, 5).elements(), 120);
    }

    #[test]
    fn zeroed_dims_have_no_elements() {
        assert_eq!(ArrayDims::zeros().elements(), 0);
        assert_eq!(ArrayDims::default(), ArrayDims::zeros());
    }
}

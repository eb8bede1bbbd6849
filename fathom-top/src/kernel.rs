use fathom_base::{Array, Shape};

/// Spatial geometry of a sliding-window kernel: shape, strides, and
/// per-dimension padding. Strides default to 1 and pads to 0; all three
/// cover only the spatial dimensions, never the channel dimension.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct KernelAttributes {
    kernel_shape: Shape,
    strides: Vec<i64>,
    begin_pads: Vec<i64>,
    end_pads: Vec<i64>,
}

impl KernelAttributes {
    pub fn new(kernel_shape: Shape, strides: &[i64], pads: &[i64]) -> Self {
        let rank = kernel_shape.rank();
        let strides = if strides.is_empty() {
            vec![1; rank]
        } else {
            strides.to_vec()
        };
        let pads = if pads.is_empty() {
            vec![0; rank]
        } else {
            pads.to_vec()
        };
        assert!(strides.len() == rank && pads.len() == rank);
        assert!(strides.iter().all(|s| *s >= 1));
        assert!(pads.iter().all(|p| *p >= 0));
        KernelAttributes {
            kernel_shape,
            strides,
            begin_pads: pads.clone(),
            end_pads: pads,
        }
    }

    pub fn rank(&self) -> usize {
        self.kernel_shape.rank()
    }

    pub fn kernel_shape(&self) -> &Shape {
        &self.kernel_shape
    }

    pub fn strides(&self) -> &[i64] {
        &self.strides
    }

    pub fn begin_pads(&self) -> &[i64] {
        &self.begin_pads
    }

    pub fn end_pads(&self) -> &[i64] {
        &self.end_pads
    }

    /// Spatial output extents: `(in + pads - kernel) / stride + 1` per
    /// dimension.
    pub fn spatial_output_shape(&self, spatial_input: &Shape) -> Shape {
        assert!(spatial_input.rank() == self.rank());
        let dims: Array = (0..self.rank())
            .map(|d| {
                let padded = spatial_input[d] + self.begin_pads[d] + self.end_pads[d];
                (padded - self.kernel_shape[d]) / self.strides[d] + 1
            })
            .collect();
        Shape::new(dims).expect("kernel output shape stays valid")
    }

    /// Full output shape with a leading channel dimension: the input's
    /// first dimension is channels and is replaced by `output_channels`.
    pub fn output_shape(&self, input_shape: &Shape, output_channels: i64) -> Shape {
        assert!(input_shape.rank() == self.rank() + 1);
        let spatial_input = input_shape
            .sub_shape(1, input_shape.rank())
            .expect("input carries spatial dimensions");
        let spatial = self.spatial_output_shape(&spatial_input);
        let mut dims = Array::zeros(0);
        dims.push(output_channels);
        for v in spatial.iter() {
            dims.push(v);
        }
        Shape::new(dims).expect("kernel output shape stays valid")
    }
}

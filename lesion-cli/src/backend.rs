//! Compute backend chosen at build time: `cuda`, then `wgpu`, else `ndarray`.

use burn::tensor::backend::Backend;
use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "cuda")] {
        pub type SelectedBackend = burn::backend::Cuda;
        pub const BACKEND_NAME: &str = "CUDA (NVIDIA GPU)";
    } else if #[cfg(feature = "wgpu")] {
        pub type SelectedBackend = burn::backend::Wgpu;
        pub const BACKEND_NAME: &str = "WGPU (GPU)";
    } else {
        pub type SelectedBackend = burn::backend::NdArray;
        pub const BACKEND_NAME: &str = "NdArray (CPU)";
    }
}

/// Default device of [`SelectedBackend`].
pub fn create_device() -> <SelectedBackend as Backend>::Device {
    Default::default()
}

#[cfg(all(test, not(any(feature = "cuda", feature = "wgpu"))))]
mod tests {
    use super::*;

    #[test]
    fn default_build_runs_on_cpu() {
        assert_eq!(BACKEND_NAME, "NdArray (CPU)");
        assert_eq!(create_device(), burn::backend::ndarray::NdArrayDevice::Cpu);
    }
}

//! DType dispatch for force kernels
//!
//! `dispatch_float_dtype!` converts a runtime [`DType`](crate::dtype::DType)
//! into a concrete float type bound to an identifier inside a block.
//!
//! ```ignore
//! dispatch_float_dtype!(dtype, T => {
//!     launch::<T>(...)?;
//! }, "prod_force_se_a");
//! ```
//!
//! - `F64` -> `f64`
//! - `F32` -> `f32`
//! - `I32` -> returns `UnsupportedDType`

/// Macro for runtime dtype dispatch to float-typed kernels.
#[macro_export]
macro_rules! dispatch_float_dtype {
    ($dtype:expr, $T:ident => $body:block, $error_op:expr) => {
        match $dtype {
            $crate::dtype::DType::F64 => {
                type $T = f64;
                $body
            }
            $crate::dtype::DType::F32 => {
                type $T = f32;
                $body
            }
            dtype @ $crate::dtype::DType::I32 => {
                return Err($crate::error::Error::UnsupportedDType {
                    dtype,
                    op: $error_op,
                })
            }
        }
    };
}

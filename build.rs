//! Build script for dpforce
//!
//! Compiles the CUDA force kernels to PTX when the cuda feature is enabled.
//!
//! # Requirements
//!
//! - CUDA Toolkit (nvcc compiler)
//! - Compute Capability 6.0+ (double precision `atomicAdd`)
//!
//! # Environment Variables
//!
//! - `CUDA_PATH`: Custom CUDA installation path (optional)
//! - `DPFORCE_CUDA_ARCH`: Target architecture passed to nvcc (default `sm_60`)

fn main() {
    #[cfg(feature = "cuda")]
    compile_cuda_kernels();
}

#[cfg(feature = "cuda")]
fn compile_cuda_kernels() {
    use std::env;
    use std::path::PathBuf;
    use std::process::Command;

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let kernels_dir = PathBuf::from("src/runtime/cuda/kernels");
    let kernel_files = ["prod_force.cu"];

    println!("cargo:rerun-if-env-changed=DPFORCE_CUDA_ARCH");
    let arch = env::var("DPFORCE_CUDA_ARCH").unwrap_or_else(|_| "sm_60".to_string());

    let nvcc = find_nvcc().unwrap_or_else(|| {
        eprintln!();
        eprintln!("=== CUDA COMPILATION ERROR ===");
        eprintln!();
        eprintln!("Could not find nvcc (NVIDIA CUDA Compiler).");
        eprintln!("Add nvcc to your PATH, or set the CUDA_PATH environment variable.");
        eprintln!();
        panic!("nvcc not found - CUDA Toolkit must be installed for the 'cuda' feature");
    });

    for kernel_file in kernel_files {
        let cu_path = kernels_dir.join(kernel_file);
        let ptx_path = out_dir.join(kernel_file.replace(".cu", ".ptx"));

        println!("cargo:rerun-if-changed={}", cu_path.display());

        if !cu_path.exists() {
            panic!("CUDA kernel source not found: {}", cu_path.display());
        }

        // No --use_fast_math: the accumulation must stay IEEE so CPU parity holds.
        let output = Command::new(&nvcc)
            .arg("-ptx")
            .arg("-O3")
            .arg(format!("-arch={arch}"))
            .arg("-o")
            .arg(&ptx_path)
            .arg(&cu_path)
            .output();

        match output {
            Ok(output) if output.status.success() => {}
            Ok(output) => {
                eprintln!();
                eprintln!("=== CUDA COMPILATION FAILED ===");
                eprintln!("Failed to compile: {kernel_file}");
                let stdout = String::from_utf8_lossy(&output.stdout);
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stdout.is_empty() {
                    eprintln!("stdout:\n{stdout}");
                }
                if !stderr.is_empty() {
                    eprintln!("stderr:\n{stderr}");
                }
                panic!("nvcc compilation failed for {kernel_file}");
            }
            Err(e) => {
                eprintln!();
                eprintln!("=== NVCC EXECUTION ERROR ===");
                eprintln!("Failed to execute nvcc at {nvcc}: {e}");
                panic!("Failed to execute nvcc: {e}");
            }
        }
    }

    println!("cargo:rustc-env=CUDA_KERNEL_DIR={}", out_dir.display());
}

#[cfg(feature = "cuda")]
fn find_nvcc() -> Option<String> {
    use std::env;
    use std::path::PathBuf;
    use std::process::Command;

    if let Ok(cuda_path) = env::var("CUDA_PATH") {
        let bin = PathBuf::from(&cuda_path).join("bin");
        for name in ["nvcc", "nvcc.exe"] {
            let nvcc = bin.join(name);
            if nvcc.exists() {
                return Some(nvcc.to_string_lossy().to_string());
            }
        }
    }

    if Command::new("nvcc").arg("--version").output().is_ok() {
        return Some("nvcc".to_string());
    }

    for path in ["/usr/local/cuda/bin/nvcc", "/opt/cuda/bin/nvcc"] {
        if PathBuf::from(path).exists() {
            return Some(path.to_string());
        }
    }

    None
}

//! WGSL sources for the se_a force reduction
//!
//! Forces are accumulated with a compare-and-swap loop on `atomic<u32>`
//! words reinterpreted as `f32`, since WGSL has no float atomics. The
//! summation order across neighbor slots is therefore scheduling dependent.

/// Shared parameter block, mirrored by `ProdForceParams` on the host
const PARAMS_STRUCT: &str = r#"
struct Params {
    nframes: u32,
    nloc: u32,
    atom_start: u32,
    nall: u32,
    nnei: u32,
    ndescrpt: u32,
    n_a_sel: u32,
    total: u32,
    force_len: u32,
    slot_start: u32,
    _pad0: u32,
    _pad1: u32,
}
"#;

const ZERO_BODY: &str = r#"
@group(0) @binding(0) var<storage, read_write> force: array<u32>;
@group(0) @binding(1) var<uniform> params: Params;

@compute @workgroup_size(256)
fn prod_force_zero(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let idx = gid.x + gid.y * nwg.x * 256u;
    if (idx >= params.force_len) {
        return;
    }
    force[idx] = 0u;
}
"#;

const ACCUMULATE_BODY: &str = r#"
@group(0) @binding(0) var<storage, read> net_deriv: array<f32>;
@group(0) @binding(1) var<storage, read> in_deriv: array<f32>;
@group(0) @binding(2) var<storage, read> nlist: array<i32>;
@group(0) @binding(3) var<storage, read_write> force: array<atomic<u32>>;
@group(0) @binding(4) var<uniform> params: Params;

fn atomic_add_force(idx: u32, value: f32) {
    var old = atomicLoad(&force[idx]);
    loop {
        let updated = bitcast<u32>(bitcast<f32>(old) + value);
        let result = atomicCompareExchangeWeak(&force[idx], old, updated);
        if (result.exchanged) {
            break;
        }
        old = result.old_value;
    }
}

// One invocation per (frame, local atom, angular slot) of the bound chunk.
// Bound rows start at local atom `atom_start`; the force binding starts at
// the chunk's first frame.
@compute @workgroup_size(256)
fn prod_force_se_a_f32(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let idx = gid.x + gid.y * nwg.x * 256u;
    if (idx >= params.total) {
        return;
    }

    let per_frame = params.nloc * params.n_a_sel;
    let frame = idx / per_frame;
    let rem = idx % per_frame;
    let i = rem / params.n_a_sel;
    let j = rem % params.n_a_sel;

    let k = nlist[frame * params.nloc * params.nnei + i * params.nnei + j];
    if (k < 0 || u32(k) >= params.nall) {
        return;
    }

    let g_base = frame * params.nloc * params.ndescrpt + i * params.ndescrpt + j * 4u;
    let c_base = frame * params.nloc * params.ndescrpt * 3u + i * params.ndescrpt * 3u + j * 12u;

    var f = vec3<f32>(0.0, 0.0, 0.0);
    for (var m: u32 = 0u; m < 4u; m = m + 1u) {
        let g = net_deriv[g_base + m];
        let c = c_base + m * 3u;
        f = f + g * vec3<f32>(in_deriv[c], in_deriv[c + 1u], in_deriv[c + 2u]);
    }

    let force_base = frame * params.nall * 3u;
    let center = force_base + (params.atom_start + i) * 3u;
    let neighbor = force_base + u32(k) * 3u;
    for (var x: u32 = 0u; x < 3u; x = x + 1u) {
        atomic_add_force(center + x, f[x]);
        atomic_add_force(neighbor + x, -f[x]);
    }
}
"#;

const VALIDATE_BODY: &str = r#"
@group(0) @binding(0) var<storage, read> nlist: array<i32>;
@group(0) @binding(1) var<storage, read_write> status: array<atomic<u32>>;
@group(0) @binding(2) var<uniform> params: Params;

// status[0]: number of bad entries, status[1]: smallest flat slot index
// over the whole batch, so chunks can share one status buffer
@compute @workgroup_size(256)
fn prod_force_validate_nlist(
    @builtin(global_invocation_id) gid: vec3<u32>,
    @builtin(num_workgroups) nwg: vec3<u32>,
) {
    let idx = gid.x + gid.y * nwg.x * 256u;
    if (idx >= params.total) {
        return;
    }

    let per_frame = params.nloc * params.n_a_sel;
    let frame = idx / per_frame;
    let rem = idx % per_frame;
    let i = rem / params.n_a_sel;
    let j = rem % params.n_a_sel;

    let k = nlist[frame * params.nloc * params.nnei + i * params.nnei + j];
    if (k >= 0 && u32(k) >= params.nall) {
        atomicAdd(&status[0], 1u);
        atomicMin(&status[1], params.slot_start + idx);
    }
}
"#;

/// Shader that clears the force buffer
pub fn zero_shader() -> String {
    format!("{PARAMS_STRUCT}{ZERO_BODY}")
}

/// Shader that scatters slot contributions into the force buffer
pub fn accumulate_shader() -> String {
    format!("{PARAMS_STRUCT}{ACCUMULATE_BODY}")
}

/// Shader that counts neighbor entries outside `[0, nall)`
pub fn validate_shader() -> String {
    format!("{PARAMS_STRUCT}{VALIDATE_BODY}")
}

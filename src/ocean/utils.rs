/// Matches `@workgroup_size(8, 8, 1)` in every ocean shader.
pub const WORKGROUP_SIZE: u32 = 8;

/// Workgroups covering a `width × height` grid, one z slice per array layer.
pub fn compute_work_group_count(width: u32, height: u32, layers: u32) -> (u32, u32, u32) {
  (
    width.div_ceil(WORKGROUP_SIZE),
    height.div_ceil(WORKGROUP_SIZE),
    layers,
  )
}

/// Dispatches enough workgroups for every texel of `layers` layers of a `width × height` grid.
pub fn dispatch_grid(pass: &mut wgpu::ComputePass<'_>, width: u32, height: u32, layers: u32) {
  let (x, y, z) = compute_work_group_count(width, height, layers);
  pass.dispatch_workgroups(x, y, z);
}

#[inline]
pub fn saturate(input: f32) -> f32 {
  input.clamp(0.0, 1.0)
}

/// Exact at both ends: `lerp(a, b, 0) == a` and `lerp(a, b, 1) == b`.
#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
  a * (1.0 - t) + b * t
}

/// Zero when the range is empty.
#[inline]
pub fn inverse_lerp(a: f32, b: f32, value: f32) -> f32 {
  if (b - a).abs() <= f32::EPSILON {
    return 0.0;
  }
  saturate((value - a) / (b - a))
}

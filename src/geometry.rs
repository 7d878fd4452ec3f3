use std::f64::consts::PI;

use crate::math::{add, cross, normalize, scale, sub};

/// Indexed triangle mesh with per-vertex normals
#[derive(Clone, Debug, Default)]
pub struct Mesh {
    pub positions: Vec<[f64; 3]>,
    pub normals: Vec<[f64; 3]>,
    /// Counter-clockwise triangles when seen from the front
    pub triangles: Vec<[usize; 3]>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Appends another mesh, re-basing its indices
    pub fn extend(&mut self, other: Mesh) {
        let base = self.positions.len();
        self.positions.extend(other.positions);
        self.normals.extend(other.normals);
        self.triangles.extend(
            other
                .triangles
                .into_iter()
                .map(|[a, b, c]| [a + base, b + base, c + base]),
        );
    }
}

/// Point on the (p, q) torus knot curve
fn torus_knot_curve(u: f64, p: f64, q: f64, radius: f64) -> [f64; 3] {
    let (su, cu) = u.sin_cos();
    let qu_over_p = q / p * u;
    let cs = qu_over_p.cos();
    [
        radius * (2.0 + cs) * 0.5 * cu,
        radius * (2.0 + cs) * su * 0.5,
        radius * qu_over_p.sin() * 0.5,
    ]
}

/// Tube swept along a (p, q) torus knot
pub fn torus_knot(
    radius: f64,
    tube: f64,
    tubular_segments: usize,
    radial_segments: usize,
    p: u32,
    q: u32,
) -> Mesh {
    let (p, q) = (p as f64, q as f64);
    let mut mesh = Mesh::default();

    for i in 0..=tubular_segments {
        let u = i as f64 / tubular_segments as f64 * p * PI * 2.0;

        // Frenet-like frame from two nearby samples on the curve
        let p1 = torus_knot_curve(u, p, q, radius);
        let p2 = torus_knot_curve(u + 0.01, p, q, radius);
        let tangent = sub(&p2, &p1);
        let n = add(&p2, &p1);
        let binormal = cross(&tangent, &n);
        let n = normalize(&cross(&binormal, &tangent));
        let binormal = normalize(&binormal);

        for j in 0..=radial_segments {
            let v = j as f64 / radial_segments as f64 * PI * 2.0;
            let cx = -tube * v.cos();
            let cy = tube * v.sin();

            let vertex = add(&p1, &add(&scale(&n, cx), &scale(&binormal, cy)));
            mesh.normals.push(normalize(&sub(&vertex, &p1)));
            mesh.positions.push(vertex);
        }
    }

    for j in 1..=tubular_segments {
        for i in 1..=radial_segments {
            let a = (radial_segments + 1) * (j - 1) + (i - 1);
            let b = (radial_segments + 1) * j + (i - 1);
            let c = (radial_segments + 1) * j + i;
            let d = (radial_segments + 1) * (j - 1) + i;
            mesh.triangles.push([a, b, d]);
            mesh.triangles.push([b, c, d]);
        }
    }

    mesh
}

/// Axis-aligned box centred on the origin with flat face normals
pub fn cuboid(width: f64, height: f64, depth: f64) -> Mesh {
    let (hx, hy, hz) = (width / 2.0, height / 2.0, depth / 2.0);

    // (normal, u, v) with u x v == normal so corners wind counter-clockwise
    let faces: [([f64; 3], [f64; 3], [f64; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -hz], [0.0, hy, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, hz], [0.0, hy, 0.0]),
        ([0.0, 1.0, 0.0], [hx, 0.0, 0.0], [0.0, 0.0, -hz]),
        ([0.0, -1.0, 0.0], [hx, 0.0, 0.0], [0.0, 0.0, hz]),
        ([0.0, 0.0, 1.0], [hx, 0.0, 0.0], [0.0, hy, 0.0]),
        ([0.0, 0.0, -1.0], [-hx, 0.0, 0.0], [0.0, hy, 0.0]),
    ];

    let mut mesh = Mesh::default();
    for (normal, u, v) in faces {
        let centre = [normal[0] * hx, normal[1] * hy, normal[2] * hz];
        let base = mesh.positions.len();
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            mesh.positions
                .push(add(&centre, &add(&scale(&u, su), &scale(&v, sv))));
            mesh.normals.push(normal);
        }
        mesh.triangles.push([base, base + 1, base + 2]);
        mesh.triangles.push([base, base + 2, base + 3]);
    }
    mesh
}

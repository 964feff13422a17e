//! Vertex packing for point-sprite backends.
//!
//! Large fields (the vortex preset seeds thousands of points) are cheaper to
//! hand to a GPU as flat vertex buffers than as thousands of canvas calls.
//! These structs are `#[repr(C)]` and `Pod`, so a backend can upload
//! [`as_bytes`] directly.

use crate::color::Color;
use crate::connections::Connection;
use crate::particle::Particle;
use bytemuck::{Pod, Zeroable};

/// One point sprite.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PointVertex {
    pub position: [f32; 3],
    pub size: f32,
    pub color: [f32; 4],
}

/// One end of a line segment.
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct LineVertex {
    pub position: [f32; 3],
    pub alpha: f32,
    pub color: [f32; 4],
}

/// Points for every live particle, with alpha folded into the color.
pub fn pack_points(particles: &[Particle]) -> Vec<PointVertex> {
    particles
        .iter()
        .filter(|p| !p.is_expired())
        .map(|p| PointVertex {
            position: p.position.to_array(),
            size: p.size,
            color: p.color.scale_alpha(p.alpha).to_array(),
        })
        .collect()
}

/// Two vertices per connection, both carrying the connection opacity.
pub fn pack_lines(particles: &[Particle], connections: &[Connection], color: Color) -> Vec<LineVertex> {
    let mut out = Vec::with_capacity(connections.len() * 2);
    for c in connections {
        let (Some(a), Some(b)) = (particles.get(c.a), particles.get(c.b)) else {
            continue;
        };
        for p in [a, b] {
            out.push(LineVertex {
                position: p.position.to_array(),
                alpha: c.opacity,
                color: color.to_array(),
            });
        }
    }
    out
}

/// Raw bytes of a vertex slice, ready for a buffer upload.
pub fn as_bytes<T: Pod>(vertices: &[T]) -> &[u8] {
    bytemuck::cast_slice(vertices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<PointVertex>(), 32);
        assert_eq!(std::mem::size_of::<LineVertex>(), 32);
    }

    #[test]
    fn test_pack_points_folds_alpha() {
        let p = Particle::new(Vec3::new(1.0, 2.0, 3.0), Color::WHITE).with_alpha(0.5);
        let verts = pack_points(&[p]);
        assert_eq!(verts.len(), 1);
        assert_eq!(verts[0].position, [1.0, 2.0, 3.0]);
        assert_eq!(verts[0].color[3], 0.5);
        assert_eq!(as_bytes(&verts).len(), 32);
    }

    #[test]
    fn test_pack_lines_skips_stale_indices() {
        let particles = vec![
            Particle::new(Vec3::ZERO, Color::WHITE),
            Particle::new(Vec3::X, Color::WHITE),
        ];
        let connections = [
            Connection {
                a: 0,
                b: 1,
                distance: 1.0,
                opacity: 0.3,
            },
            Connection {
                a: 1,
                b: 7,
                distance: 1.0,
                opacity: 0.3,
            },
        ];
        let verts = pack_lines(&particles, &connections, Color::WHITE);
        assert_eq!(verts.len(), 2);
        assert_eq!(verts[1].position, [1.0, 0.0, 0.0]);
    }
}

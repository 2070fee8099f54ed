//! Vertex layout and quad geometry.

use ash::vk;
use std::mem::{offset_of, size_of};

/// A 2D position with an RGB color.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 2],
    pub color: [f32; 3],
}

impl Vertex {
    pub const fn new(position: [f32; 2], color: [f32; 3]) -> Self {
        Self { position, color }
    }

    /// Per-vertex binding 0.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(size_of::<Self>() as u32)
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    /// Position at location 0, color at location 1.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32_SFLOAT)
                .offset(offset_of!(Self, position) as u32),
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(offset_of!(Self, color) as u32),
        ]
    }
}

/// Red, green, blue and white corners of a unit quad centered at the origin.
pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex::new([-0.5, -0.5], [1.0, 0.0, 0.0]),
    Vertex::new([0.5, -0.5], [0.0, 1.0, 0.0]),
    Vertex::new([0.5, 0.5], [0.0, 0.0, 1.0]),
    Vertex::new([-0.5, 0.5], [1.0, 1.0, 1.0]),
];

/// Two triangles covering the quad.
pub const QUAD_INDICES: [u16; 6] = [0, 1, 2, 2, 3, 0];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(size_of::<Vertex>(), 20);
        assert_eq!(Vertex::binding_description().stride, 20);

        let attributes = Vertex::attribute_descriptions();
        assert_eq!(attributes[0].offset, 0);
        assert_eq!(attributes[1].offset, 8);
        assert_eq!(attributes[1].location, 1);
        assert_eq!(attributes[1].format, vk::Format::R32G32B32_SFLOAT);
    }

    #[test]
    fn indices_reference_every_vertex() {
        assert!(QUAD_INDICES
            .iter()
            .all(|&i| (i as usize) < QUAD_VERTICES.len()));
        for v in 0..QUAD_VERTICES.len() as u16 {
            assert!(QUAD_INDICES.contains(&v));
        }
    }

    #[test]
    fn triangles_wind_consistently() {
        // Signed area in vertex space; both triangles share a winding.
        let area = |a: usize, b: usize, c: usize| {
            let [ax, ay] = QUAD_VERTICES[a].position;
            let [bx, by] = QUAD_VERTICES[b].position;
            let [cx, cy] = QUAD_VERTICES[c].position;
            (bx - ax) * (cy - ay) - (by - ay) * (cx - ax)
        };
        let first = area(0, 1, 2);
        let second = area(2, 3, 0);
        assert!(first > 0.0);
        assert!(second > 0.0);
    }

    #[test]
    fn geometry_casts_to_bytes() {
        let bytes: &[u8] = bytemuck::cast_slice(&QUAD_VERTICES);
        assert_eq!(bytes.len(), 80);
        let bytes: &[u8] = bytemuck::cast_slice(&QUAD_INDICES);
        assert_eq!(bytes.len(), 12);
    }
}

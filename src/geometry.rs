//! Static particle geometry.
//!
//! Every snowflake is a camera-facing quad. Nothing about a flake changes
//! after upload: the vertex stage replays its fall from `time mod lifetime`,
//! so the CPU only generates the per-vertex attribute arrays once.
//!
//! Each particle expands into four vertices that share `lifetime`,
//! `center_offset` and `velocity`, while `tri_corner` and `tex_coord` walk
//! the same four-entry cycle. Two triangles `(0, 1, 2, 0, 2, 3)` per particle
//! are offset by `4 * particle_index` in the shared index buffer.

use glam::Vec3;
use rand::Rng;

use crate::error::GeometryError;
use crate::vertex::VertexInput;

/// Vertices emitted per particle.
pub const VERTICES_PER_PARTICLE: usize = 4;

/// Indices emitted per particle (two triangles).
pub const INDICES_PER_PARTICLE: usize = 6;

/// Billboard corner offsets, in vertex order.
pub const TRI_CORNERS: [[f32; 2]; VERTICES_PER_PARTICLE] =
    [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];

/// Texture coordinates matching [`TRI_CORNERS`].
pub const TEX_COORDS: [[f32; 2]; VERTICES_PER_PARTICLE] =
    [[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]];

/// Quad triangulation relative to the particle's first vertex.
pub const QUAD_INDICES: [u32; INDICES_PER_PARTICLE] = [0, 1, 2, 0, 2, 3];

/// Vertex attribute names, in vertex buffer slot order.
pub const ATTRIBUTE_NAMES: [&str; 5] =
    ["lifetime", "tex_coords", "tri_corner", "center_offset", "velocity"];

/// Height every flake starts its cycle at.
pub const START_HEIGHT: f32 = 0.5;

/// Diameter of the spawn disc on the XZ plane.
pub const SPAWN_DIAMETER: f32 = 0.5;

/// Per-particle parameters shared by its four vertices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleParams {
    /// Seconds before the particle's fall repeats.
    pub lifetime: f32,
    /// Spawn position.
    pub center_offset: Vec3,
    /// Vertical drift rate; negative values fall.
    pub velocity: f32,
}

impl ParticleParams {
    /// Draw a flake: lifetime in `[5, 8)`, x in `[-0.25, 0.25)`, z half of
    /// that range, y at [`START_HEIGHT`], velocity in `[-0.15, -0.05)`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let half = SPAWN_DIAMETER / 2.0;
        let lifetime = rng.gen_range(5.0..8.0);
        let x = rng.gen_range(-half..half);
        let z = rng.gen_range(-half..half) / 2.0;
        let velocity = rng.gen_range(-0.15..-0.05);

        Self {
            lifetime,
            center_offset: Vec3::new(x, START_HEIGHT, z),
            velocity,
        }
    }
}

/// Validates a particle count for indexed quad rendering.
pub fn check_particle_count(count: u32) -> Result<(), GeometryError> {
    if count == 0 {
        return Err(GeometryError::InvalidParticleCount(count));
    }
    if count.checked_mul(VERTICES_PER_PARTICLE as u32).is_none() {
        return Err(GeometryError::TooManyParticles(count));
    }
    Ok(())
}

/// Generates [`ParticleGeometry`] for a fixed particle count.
#[derive(Debug, Clone, Copy)]
pub struct GeometryBuilder {
    particle_count: u32,
}

impl GeometryBuilder {
    /// Create a builder, rejecting counts that cannot be rendered.
    pub fn new(particle_count: u32) -> Result<Self, GeometryError> {
        check_particle_count(particle_count)?;
        Ok(Self { particle_count })
    }

    /// Number of particles this builder produces.
    pub fn particle_count(&self) -> u32 {
        self.particle_count
    }

    /// Generate randomized particles from `rng`.
    pub fn build<R: Rng + ?Sized>(&self, rng: &mut R) -> ParticleGeometry {
        let params = (0..self.particle_count).map(|_| ParticleParams::random(rng));
        self.assemble(params)
    }

    /// Expand explicit particle parameters.
    ///
    /// `params` must yield exactly `particle_count` items; anything else is
    /// reported as a length mismatch.
    pub fn build_from_params<I>(&self, params: I) -> Result<ParticleGeometry, GeometryError>
    where
        I: IntoIterator<Item = ParticleParams>,
    {
        let params: Vec<ParticleParams> = params.into_iter().collect();
        let expected = self.particle_count as usize;
        if params.len() != expected {
            return Err(GeometryError::LengthMismatch {
                attribute: "particles",
                expected,
                actual: params.len(),
            });
        }
        Ok(self.assemble(params))
    }

    fn assemble<I>(&self, params: I) -> ParticleGeometry
    where
        I: IntoIterator<Item = ParticleParams>,
    {
        let count = self.particle_count as usize;
        let vertex_count = count * VERTICES_PER_PARTICLE;
        let mut geometry = ParticleGeometry {
            lifetimes: Vec::with_capacity(vertex_count),
            tex_coords: Vec::with_capacity(vertex_count),
            tri_corners: Vec::with_capacity(vertex_count),
            center_offsets: Vec::with_capacity(vertex_count),
            velocities: Vec::with_capacity(vertex_count),
            indices: Vec::with_capacity(count * INDICES_PER_PARTICLE),
        };

        for (i, particle) in params.into_iter().enumerate() {
            for corner in 0..VERTICES_PER_PARTICLE {
                geometry.lifetimes.push(particle.lifetime);
                geometry.tri_corners.push(TRI_CORNERS[corner]);
                geometry.tex_coords.push(TEX_COORDS[corner]);
                geometry.center_offsets.push(particle.center_offset.to_array());
                geometry.velocities.push(particle.velocity);
            }

            let base = (i * VERTICES_PER_PARTICLE) as u32;
            geometry
                .indices
                .extend(QUAD_INDICES.iter().map(|index| index + base));
        }

        geometry
    }
}

/// Parallel per-vertex attribute arrays plus the shared index list.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleGeometry {
    pub lifetimes: Vec<f32>,
    pub tex_coords: Vec<[f32; 2]>,
    pub tri_corners: Vec<[f32; 2]>,
    pub center_offsets: Vec<[f32; 3]>,
    pub velocities: Vec<f32>,
    pub indices: Vec<u32>,
}

impl ParticleGeometry {
    /// Number of particles, derived from the index list.
    pub fn particle_count(&self) -> usize {
        self.indices.len() / INDICES_PER_PARTICLE
    }

    pub fn vertex_count(&self) -> usize {
        self.lifetimes.len()
    }

    pub fn index_count(&self) -> u32 {
        self.indices.len() as u32
    }

    /// Raw bytes of each attribute array, in [`ATTRIBUTE_NAMES`] order.
    pub fn attribute_bytes(&self) -> [&[u8]; 5] {
        [
            bytemuck::cast_slice(&self.lifetimes),
            bytemuck::cast_slice(&self.tex_coords),
            bytemuck::cast_slice(&self.tri_corners),
            bytemuck::cast_slice(&self.center_offsets),
            bytemuck::cast_slice(&self.velocities),
        ]
    }

    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }

    /// Gather the attributes of vertex `index` as the vertex stage sees them.
    pub fn vertex(&self, index: usize) -> Option<VertexInput> {
        Some(VertexInput {
            lifetime: *self.lifetimes.get(index)?,
            tex_coord: (*self.tex_coords.get(index)?).into(),
            tri_corner: (*self.tri_corners.get(index)?).into(),
            center_offset: (*self.center_offsets.get(index)?).into(),
            velocity: *self.velocities.get(index)?,
        })
    }

    /// Check the buffer contract before upload.
    ///
    /// Every attribute array must hold four entries per particle and every
    /// index must address an existing vertex.
    pub fn validate(&self) -> Result<(), GeometryError> {
        let particles = self.particle_count();
        if particles == 0 || self.indices.len() % INDICES_PER_PARTICLE != 0 {
            return Err(GeometryError::InvalidParticleCount(particles as u32));
        }

        let expected = particles * VERTICES_PER_PARTICLE;
        let lengths = [
            ("lifetime", self.lifetimes.len()),
            ("tex_coords", self.tex_coords.len()),
            ("tri_corner", self.tri_corners.len()),
            ("center_offset", self.center_offsets.len()),
            ("velocity", self.velocities.len()),
        ];
        for (attribute, actual) in lengths {
            if actual != expected {
                return Err(GeometryError::LengthMismatch {
                    attribute,
                    expected,
                    actual,
                });
            }
        }

        if let Some((position, &index)) = self
            .indices
            .iter()
            .enumerate()
            .find(|(_, index)| **index as usize >= expected)
        {
            return Err(GeometryError::IndexOutOfRange {
                position,
                index,
                vertex_count: expected,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn build(count: u32, seed: u64) -> ParticleGeometry {
        let mut rng = StdRng::seed_from_u64(seed);
        GeometryBuilder::new(count).unwrap().build(&mut rng)
    }

    #[test]
    fn test_zero_particles_rejected() {
        assert_eq!(
            GeometryBuilder::new(0).unwrap_err(),
            GeometryError::InvalidParticleCount(0)
        );
    }

    #[test]
    fn test_overflowing_count_rejected() {
        assert_eq!(
            GeometryBuilder::new(u32::MAX).unwrap_err(),
            GeometryError::TooManyParticles(u32::MAX)
        );
    }

    #[test]
    fn test_lengths() {
        let geometry = build(300, 1);
        assert_eq!(geometry.vertex_count(), 1200);
        assert_eq!(geometry.tex_coords.len(), 1200);
        assert_eq!(geometry.tri_corners.len(), 1200);
        assert_eq!(geometry.center_offsets.len(), 1200);
        assert_eq!(geometry.velocities.len(), 1200);
        assert_eq!(geometry.indices.len(), 1800);
        assert_eq!(geometry.particle_count(), 300);
        assert!(geometry.validate().is_ok());
    }

    #[test]
    fn test_index_pattern() {
        let geometry = build(3, 7);
        assert_eq!(
            geometry.indices,
            vec![0, 1, 2, 0, 2, 3, 4, 5, 6, 4, 6, 7, 8, 9, 10, 8, 10, 11]
        );
    }

    #[test]
    fn test_parameter_ranges() {
        let geometry = build(500, 42);
        for vertex in 0..geometry.vertex_count() {
            let v = geometry.vertex(vertex).unwrap();
            assert!((5.0..8.0).contains(&v.lifetime));
            assert!((-0.15..-0.05).contains(&v.velocity));
            assert!((-0.25..0.25).contains(&v.center_offset.x));
            assert!((-0.125..0.125).contains(&v.center_offset.z));
            assert_eq!(v.center_offset.y, START_HEIGHT);
        }
    }

    #[test]
    fn test_particle_params_shared_across_quad() {
        let geometry = build(20, 3);
        for particle in 0..20 {
            let first = particle * VERTICES_PER_PARTICLE;
            for corner in 1..VERTICES_PER_PARTICLE {
                assert_eq!(geometry.lifetimes[first], geometry.lifetimes[first + corner]);
                assert_eq!(geometry.velocities[first], geometry.velocities[first + corner]);
                assert_eq!(
                    geometry.center_offsets[first],
                    geometry.center_offsets[first + corner]
                );
            }
        }
    }

    #[test]
    fn test_build_from_params_count_mismatch() {
        let builder = GeometryBuilder::new(2).unwrap();
        let one = ParticleParams {
            lifetime: 5.0,
            center_offset: Vec3::new(0.0, START_HEIGHT, 0.0),
            velocity: 0.0,
        };
        let err = builder.build_from_params([one]).unwrap_err();
        assert_eq!(
            err,
            GeometryError::LengthMismatch {
                attribute: "particles",
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn test_validate_catches_truncated_attribute() {
        let mut geometry = build(4, 9);
        geometry.velocities.pop();
        assert_eq!(
            geometry.validate().unwrap_err(),
            GeometryError::LengthMismatch {
                attribute: "velocity",
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn test_validate_catches_bad_index() {
        let mut geometry = build(2, 9);
        geometry.indices[5] = 8;
        assert_eq!(
            geometry.validate().unwrap_err(),
            GeometryError::IndexOutOfRange {
                position: 5,
                index: 8,
                vertex_count: 8
            }
        );
    }

    #[test]
    fn test_same_seed_same_geometry() {
        assert_eq!(build(50, 11), build(50, 11));
    }
}

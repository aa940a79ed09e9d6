//! End-to-end tests of the CPU side of the snow pipeline.
//!
//! Everything here runs without a GPU: geometry generation, the wind
//! history, the camera, the render loop state machine and the CPU mirror of
//! the vertex stage.

use std::f32::consts::FRAC_PI_3;
use std::time::{Duration, Instant};

use glam::{Mat4, Vec3};
use rand::rngs::StdRng;
use rand::SeedableRng;
use snowfall::geometry::{
    GeometryBuilder, ParticleParams, INDICES_PER_PARTICLE, TEX_COORDS, TRI_CORNERS,
    VERTICES_PER_PARTICLE,
};
use snowfall::render_loop::{Frame, FrameSink, RenderLoop, TickOutcome};
use snowfall::time::SimClock;
use snowfall::vertex::{clip_position, world_position, DriftParams};
use snowfall::wind::{Wind, WindDirection, WindHistory, WIND_HISTORY_LEN, WIND_TICK_INTERVAL};
use snowfall::{CameraController, Projection, ShaderProgram};

#[derive(Default)]
struct RecordingSink {
    times: Vec<f32>,
}

impl FrameSink for RecordingSink {
    type Error = std::convert::Infallible;

    fn draw(&mut self, frame: &Frame<'_>) -> Result<(), Self::Error> {
        assert_eq!(frame.wind_history.len(), WIND_HISTORY_LEN);
        self.times.push(frame.time);
        Ok(())
    }
}

// ============================================================================
// Geometry
// ============================================================================

#[test]
fn test_attribute_and_index_lengths() {
    let mut rng = StdRng::seed_from_u64(1);
    for n in [1u32, 2, 7, 300, 1024] {
        let geometry = GeometryBuilder::new(n).unwrap().build(&mut rng);
        let vertices = n as usize * VERTICES_PER_PARTICLE;

        assert_eq!(geometry.lifetimes.len(), vertices);
        assert_eq!(geometry.tex_coords.len(), vertices);
        assert_eq!(geometry.tri_corners.len(), vertices);
        assert_eq!(geometry.center_offsets.len(), vertices);
        assert_eq!(geometry.velocities.len(), vertices);
        assert_eq!(geometry.indices.len(), n as usize * INDICES_PER_PARTICLE);
        assert!(geometry.indices.iter().all(|&i| (i as usize) < vertices));
        assert!(geometry.validate().is_ok());
    }
}

#[test]
fn test_corner_cycle_repeats_per_particle() {
    let mut rng = StdRng::seed_from_u64(2);
    let geometry = GeometryBuilder::new(50).unwrap().build(&mut rng);

    for (particle, corners) in geometry.tri_corners.chunks(VERTICES_PER_PARTICLE).enumerate() {
        assert_eq!(corners, &TRI_CORNERS[..], "particle {particle}");
    }
    for (particle, coords) in geometry.tex_coords.chunks(VERTICES_PER_PARTICLE).enumerate() {
        assert_eq!(coords, &TEX_COORDS[..], "particle {particle}");
    }
}

#[test]
fn test_particle_attributes_shared_by_its_vertices() {
    let mut rng = StdRng::seed_from_u64(3);
    let geometry = GeometryBuilder::new(20).unwrap().build(&mut rng);

    for chunk in geometry.lifetimes.chunks(VERTICES_PER_PARTICLE) {
        assert!(chunk.iter().all(|&l| l == chunk[0]));
        assert!((5.0..8.0).contains(&chunk[0]));
    }
    for chunk in geometry.velocities.chunks(VERTICES_PER_PARTICLE) {
        assert!(chunk.iter().all(|&v| v == chunk[0]));
        assert!((-0.15..-0.05).contains(&chunk[0]));
    }
}

// ============================================================================
// Wind history
// ============================================================================

#[test]
fn test_wind_history_keeps_newest_first() {
    for k in [0usize, 1, 5, 799, 800] {
        let mut history = WindHistory::new();
        for v in 1..=k {
            history.tick(v as f32);
        }

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), WIND_HISTORY_LEN);
        for (i, &sample) in snapshot.iter().take(k).enumerate() {
            assert_eq!(sample, (k - i) as f32);
        }
        assert!(snapshot[k..].iter().all(|&s| s == 0.0));
    }
}

#[test]
fn test_wind_history_length_after_many_ticks() {
    let mut history = WindHistory::new();
    for v in 0..5_000 {
        history.tick(v as f32);
    }
    assert_eq!(history.snapshot().len(), WIND_HISTORY_LEN);
    assert_eq!(history.latest(), 4_999.0);
    assert_eq!(history.snapshot()[WIND_HISTORY_LEN - 1], 4_200.0);
}

#[test]
fn test_key_press_reaches_history_on_next_tick() {
    let start = Instant::now();
    let mut wind = Wind::starting_at(WIND_TICK_INTERVAL, 0.05, start);

    wind.nudge(WindDirection::Positive);
    wind.nudge(WindDirection::Positive);
    assert_eq!(wind.history().latest(), 0.0);

    assert_eq!(wind.update(start + WIND_TICK_INTERVAL), 1);
    assert!((wind.history().latest() - 0.1).abs() < 1e-6);

    wind.nudge(WindDirection::Negative);
    wind.update(start + WIND_TICK_INTERVAL * 2);
    let snapshot = wind.history().snapshot();
    assert!((snapshot[0] - 0.05).abs() < 1e-6);
    assert!((snapshot[1] - 0.1).abs() < 1e-6);
}

#[test]
fn test_long_stall_fills_one_window() {
    let start = Instant::now();
    let mut wind = Wind::starting_at(WIND_TICK_INTERVAL, 0.05, start);
    wind.nudge(WindDirection::Negative);

    let applied = wind.update(start + Duration::from_secs(60));
    assert_eq!(applied, WIND_HISTORY_LEN as u64);
    assert!(wind
        .history()
        .snapshot()
        .iter()
        .all(|&s| (s + 0.05).abs() < 1e-6));
}

// ============================================================================
// Camera
// ============================================================================

#[test]
fn test_camera_at_rest_is_canonical_look_at() {
    let camera = CameraController::new();
    let expected = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 0.5), Vec3::ZERO, Vec3::Y);

    assert!(camera.position().abs_diff_eq(Vec3::new(0.0, 0.0, 0.5), 1e-6));
    assert!(camera.view_matrix().abs_diff_eq(expected, 1e-6));
}

#[test]
fn test_camera_drag_keeps_distance() {
    let mut camera = CameraController::new();
    camera.apply_drag(123.0, -45.0);
    assert!((camera.position().length() - 0.5).abs() < 1e-5);
    assert!((camera.yaw + 123.0 / 60.0).abs() < 1e-6);
    assert!((camera.pitch + 45.0 / 60.0).abs() < 1e-6);
}

// ============================================================================
// Clock and render loop
// ============================================================================

#[test]
fn test_clock_never_decreases() {
    let mut clock = SimClock::new(3.0);
    let mut previous = clock.elapsed();
    for delta in [0.016, -0.5, 0.0, 0.02, -1e9, f32::NAN, 0.3, f32::NEG_INFINITY] {
        let now = clock.advance(delta);
        assert!(now >= previous, "{delta} moved the clock back");
        previous = now;
    }
}

#[test]
fn test_render_loop_draw_counts() {
    let mut render_loop = RenderLoop::new(3.0);
    let wind = WindHistory::new();
    let camera = CameraController::new();
    let mut sink = RecordingSink::default();

    for _ in 0..30 {
        let outcome = render_loop.tick(0.016, &wind, &camera, &mut sink).unwrap();
        assert_eq!(outcome, TickOutcome::Skipped);
    }
    assert!(sink.times.is_empty());

    render_loop.activate();
    for _ in 0..40 {
        let outcome = render_loop.tick(0.016, &wind, &camera, &mut sink).unwrap();
        assert_eq!(outcome, TickOutcome::Drawn);
    }
    assert_eq!(sink.times.len(), 40);
    assert!(sink.times.windows(2).all(|w| w[1] >= w[0]));
    // Waiting ticks still kept time.
    assert!(sink.times[0] > 3.0 + 30.0 * 0.016 - 1e-3);
}

// ============================================================================
// Vertex stage
// ============================================================================

#[test]
fn test_fall_is_periodic_over_lifetime() {
    let geometry = GeometryBuilder::new(1)
        .unwrap()
        .build_from_params([ParticleParams {
            lifetime: 5.0,
            center_offset: Vec3::new(0.0, 0.5, 0.0),
            velocity: 0.0,
        }])
        .unwrap();
    let wind = WindHistory::new();
    let camera = CameraController::new();
    let view = camera.view_matrix();
    let projection = Projection::new(FRAC_PI_3, 1.0, 0.01, 1000.0).matrix();
    let params = DriftParams::default();

    for i in 0..geometry.vertex_count() {
        let vertex = geometry.vertex(i).unwrap();
        let start = clip_position(&vertex, 0.0, wind.snapshot(), &view, &projection, &params);
        let cycle = clip_position(&vertex, 5.0, wind.snapshot(), &view, &projection, &params);
        assert_eq!(start, cycle, "vertex {i}");
    }
}

#[test]
fn test_flakes_fall_and_wrap() {
    let params = ParticleParams {
        lifetime: 5.0,
        center_offset: Vec3::new(0.1, 0.5, 0.0),
        velocity: -0.1,
    };
    let geometry = GeometryBuilder::new(1)
        .unwrap()
        .build_from_params([params])
        .unwrap();
    let vertex = geometry.vertex(0).unwrap();
    let wind = WindHistory::new();
    let view = CameraController::new().view_matrix();
    let drift = DriftParams::default();

    let at = |time| world_position(&vertex, time, wind.snapshot(), &view, &drift);
    assert!(at(4.0).y < at(1.0).y);
    assert!((at(1.0).y - at(6.0).y).abs() < 1e-5);
}

#[test]
fn test_wind_pushes_sideways() {
    let geometry = GeometryBuilder::new(1)
        .unwrap()
        .build_from_params([ParticleParams {
            lifetime: 8.0,
            center_offset: Vec3::new(0.0, 0.5, 0.0),
            velocity: -0.1,
        }])
        .unwrap();
    let vertex = geometry.vertex(0).unwrap();
    let view = CameraController::new().view_matrix();
    let drift = DriftParams::default();

    let mut calm = WindHistory::new();
    let mut gusty = WindHistory::new();
    for _ in 0..WIND_HISTORY_LEN {
        calm.tick(0.0);
        gusty.tick(0.2);
    }

    let still = world_position(&vertex, 2.0, calm.snapshot(), &view, &drift);
    let pushed = world_position(&vertex, 2.0, gusty.snapshot(), &view, &drift);
    // 200 ticks of 0.2, samples 1..=200.
    let expected = 200.0 * 0.2 * drift.wind_scale;
    assert!((pushed.x - still.x - expected).abs() < 1e-4);
    assert_eq!(pushed.y, still.y);
}

// ============================================================================
// Shader
// ============================================================================

#[test]
fn test_builtin_program_links() {
    let program = ShaderProgram::snow().unwrap();
    assert_eq!(program.attributes().len(), 5);
    assert_eq!(program.vertex_buffer_layouts().len(), 5);
    assert_ne!(program.frame_uniforms().group, program.texture().group);
}
